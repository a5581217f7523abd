//! Datagram-socket binding: unreliable, unordered, connectionless.
//!
//! The client "connects" only to fix the default destination; the server
//! binds and learns the peer from the first datagram. Every send is one
//! best-effort datagram; the stop-and-wait discipline is what recovers a
//! reliability property on top.

use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    time::{Duration, Instant},
};

use tokio::net::UdpSocket;
use tracing::debug;

use crate::{
    error::{BenchError, Result},
    transport::{AckOutcome, Received, ACK, MAX_RECV},
};

fn unspecified_for(addr: SocketAddr) -> SocketAddr {
    match addr {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    }
}

#[derive(Debug)]
pub struct UdpClientSession {
    socket: UdpSocket,
}

impl UdpClientSession {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(unspecified_for(addr))
            .await
            .map_err(|e| BenchError::ConnectFailed {
                addr,
                reason: e.to_string(),
            })?;
        socket
            .connect(addr)
            .await
            .map_err(|e| BenchError::ConnectFailed {
                addr,
                reason: e.to_string(),
            })?;
        Ok(Self { socket })
    }

    pub async fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.socket.send(payload).await?;
        Ok(())
    }

    /// Waits for the acknowledgment sentinel, bounded by `deadline` when one
    /// is configured. Datagrams that are not the sentinel are discarded.
    pub async fn await_ack(&mut self, deadline: Option<Duration>) -> Result<AckOutcome> {
        let started = Instant::now();
        let mut buf = [0u8; 1024];
        loop {
            let n = match deadline {
                Some(limit) => {
                    let Some(remaining) = limit.checked_sub(started.elapsed()) else {
                        return Ok(AckOutcome::TimedOut);
                    };
                    match tokio::time::timeout(remaining, self.socket.recv(&mut buf)).await {
                        Ok(received) => received?,
                        Err(_) => return Ok(AckOutcome::TimedOut),
                    }
                }
                None => self.socket.recv(&mut buf).await?,
            };
            if n == 0 {
                return Ok(AckOutcome::Closed);
            }
            if buf[..n] == ACK {
                return Ok(AckOutcome::Acked);
            }
            debug!(len = n, "ignoring unexpected datagram while awaiting an acknowledgment");
        }
    }

    pub async fn close(self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
pub struct UdpServerSession {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
    buf: Vec<u8>,
}

impl UdpServerSession {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| BenchError::BindFailed {
                addr,
                reason: e.to_string(),
            })?;
        Ok(Self {
            socket,
            peer: None,
            buf: vec![0; MAX_RECV],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receives one datagram, remembering the sender as the peer to
    /// acknowledge. An empty datagram is indistinguishable from a peer that
    /// went away, and is reported as closed.
    pub async fn recv(&mut self) -> Result<Received> {
        let (n, peer) = self.socket.recv_from(&mut self.buf).await?;
        self.peer = Some(peer);
        if n == 0 {
            return Ok(Received::Closed);
        }
        Ok(Received::Data(self.buf[..n].to_vec()))
    }

    pub async fn send_ack(&mut self) -> Result<()> {
        match self.peer {
            Some(peer) => {
                self.socket.send_to(&ACK, peer).await?;
                Ok(())
            }
            None => Err(BenchError::ConnectionClosed),
        }
    }

    pub async fn close(self) -> Result<()> {
        Ok(())
    }
}
