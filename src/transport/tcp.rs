//! Stream-socket binding: reliable, ordered, connection-oriented.
//!
//! Whole buffers are sent without explicit framing; the stream's in-order
//! delivery lets the termination marker double as the end-of-stream
//! sentinel. A zero-length read before the marker is a premature close.

use std::{io, net::SocketAddr};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tracing::debug;

use crate::{
    error::{BenchError, Result},
    transport::{AckOutcome, Received, ACK, MAX_RECV},
};

#[derive(Debug)]
pub struct TcpClientSession {
    stream: TcpStream,
}

impl TcpClientSession {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| BenchError::ConnectFailed {
                addr,
                reason: e.to_string(),
            })?;
        Ok(Self { stream })
    }

    pub async fn send(&mut self, payload: &[u8]) -> Result<()> {
        Ok(self.stream.write_all(payload).await?)
    }

    pub async fn await_ack(&mut self) -> Result<AckOutcome> {
        let mut buf = [0u8; ACK.len()];
        loop {
            match self.stream.read_exact(&mut buf).await {
                Ok(_) if buf == ACK => return Ok(AckOutcome::Acked),
                Ok(_) => {
                    debug!("ignoring unexpected bytes while awaiting an acknowledgment");
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(AckOutcome::Closed)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.stream.shutdown().await.ok();
        Ok(())
    }
}

#[derive(Debug)]
pub struct TcpServerSession {
    listener: TcpListener,
    stream: Option<TcpStream>,
    buf: Vec<u8>,
}

impl TcpServerSession {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BenchError::BindFailed {
                addr,
                reason: e.to_string(),
            })?;
        Ok(Self {
            listener,
            stream: None,
            buf: vec![0; MAX_RECV],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts exactly one client on the first call, then reads from it.
    pub async fn recv(&mut self) -> Result<Received> {
        if self.stream.is_none() {
            let (stream, peer) = self.listener.accept().await?;
            debug!(%peer, "accepted client connection");
            self.stream = Some(stream);
        }
        let stream = self.stream.as_mut().expect("connection just accepted");
        let n = stream.read(&mut self.buf).await?;
        if n == 0 {
            return Ok(Received::Closed);
        }
        Ok(Received::Data(self.buf[..n].to_vec()))
    }

    pub async fn send_ack(&mut self) -> Result<()> {
        match self.stream.as_mut() {
            Some(stream) => Ok(stream.write_all(&ACK).await?),
            None => Err(BenchError::ConnectionClosed),
        }
    }

    pub async fn close(mut self) -> Result<()> {
        if let Some(stream) = self.stream.as_mut() {
            stream.shutdown().await.ok();
        }
        Ok(())
    }
}
