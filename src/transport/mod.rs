//! Transport sessions: one uniform send/receive/close surface over three
//! bindings with very different connection models.
//!
//! The bindings form a closed set, dispatched as a tagged union so the
//! client and server runners stay transport-agnostic: a reliable ordered
//! stream (TCP), best-effort datagrams (UDP), and one reliable stream
//! multiplexed over an unreliable substrate (QUIC). Errors are surfaced to
//! the runner, never retried here.

mod quic;
mod tcp;
mod tls;
mod udp;

use std::{net::SocketAddr, time::Duration};

use crate::{
    config::{RunConfig, TransportKind},
    error::Result,
};

pub use quic::{QuicClientSession, QuicServerSession};
pub use tcp::{TcpClientSession, TcpServerSession};
pub use udp::{UdpClientSession, UdpServerSession};

/// The acknowledgment sentinel for the stop-and-wait discipline,
/// distinguishable from data blocks and from any valid termination marker.
pub const ACK: [u8; 3] = *b"ACK";

/// Payload blocks carry this filler byte; the termination marker must not
/// consist of it exclusively.
pub const FILLER: u8 = b'0';

/// Receive buffer size, the theoretical datagram maximum.
pub const MAX_RECV: usize = 65_535;

/// Ceiling for a single datagram payload, kept below [`MAX_RECV`] to leave
/// room for protocol headers.
pub const MAX_DATAGRAM_PAYLOAD: u64 = 65_000;

/// One received unit: a payload, or the peer going away.
#[derive(Debug)]
pub enum Received {
    Data(Vec<u8>),
    Closed,
}

/// Outcome of waiting for a stop-and-wait acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Acked,
    /// The configured deadline elapsed first. Only possible on the datagram
    /// binding, where a deadline is set.
    TimedOut,
    Closed,
}

/// Client half of a transport session. Owns the connection resource for the
/// duration of the run and is closed exactly once on every exit path.
#[derive(Debug)]
pub enum ClientSession {
    Tcp(TcpClientSession),
    Udp(UdpClientSession),
    Quic(QuicClientSession),
}

impl ClientSession {
    /// Performs the binding's notion of connection establishment: a TCP
    /// connect, a UDP local connect (fixing the destination without a
    /// handshake), or a full QUIC handshake plus one stream open.
    pub async fn connect(config: &RunConfig) -> Result<Self> {
        let addr = config.resolve().await?;
        Ok(match config.transport {
            TransportKind::Tcp => Self::Tcp(TcpClientSession::connect(addr).await?),
            TransportKind::Udp => Self::Udp(UdpClientSession::connect(addr).await?),
            TransportKind::Quic => Self::Quic(QuicClientSession::connect(addr).await?),
        })
    }

    /// Sends one payload. On the datagram binding this is one best-effort
    /// datagram; on the stream bindings the whole buffer is handed to the
    /// transport, trusting in-order delivery.
    pub async fn send(&mut self, payload: &[u8]) -> Result<()> {
        match self {
            Self::Tcp(session) => session.send(payload).await,
            Self::Udp(session) => session.send(payload).await,
            Self::Quic(session) => session.send(payload).await,
        }
    }

    /// Waits until the acknowledgment sentinel is observed. The deadline
    /// applies on the datagram binding only; the other bindings wait
    /// unbounded (the driver enforces the outer budget).
    pub async fn await_ack(&mut self, deadline: Option<Duration>) -> Result<AckOutcome> {
        match self {
            Self::Tcp(session) => session.await_ack().await,
            Self::Udp(session) => session.await_ack(deadline).await,
            Self::Quic(session) => Ok(session.await_ack().await),
        }
    }

    pub async fn close(self) -> Result<()> {
        match self {
            Self::Tcp(session) => session.close().await,
            Self::Udp(session) => session.close().await,
            Self::Quic(session) => session.close().await,
        }
    }
}

/// Server half of a transport session. Bound up front; the peer is learned
/// lazily from the first connection attempt or datagram.
#[derive(Debug)]
pub enum ServerSession {
    Tcp(TcpServerSession),
    Udp(UdpServerSession),
    Quic(QuicServerSession),
}

impl ServerSession {
    pub async fn bind(config: &RunConfig) -> Result<Self> {
        let addr = config.resolve().await?;
        Ok(match config.transport {
            TransportKind::Tcp => Self::Tcp(TcpServerSession::bind(addr).await?),
            TransportKind::Udp => Self::Udp(UdpServerSession::bind(addr).await?),
            TransportKind::Quic => Self::Quic(QuicServerSession::bind(addr)?),
        })
    }

    /// The actually bound address, useful when the configuration asked for
    /// an ephemeral port.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        match self {
            Self::Tcp(session) => session.local_addr(),
            Self::Udp(session) => session.local_addr(),
            Self::Quic(session) => session.local_addr(),
        }
    }

    /// Receives the next payload, accepting the peer first if none is
    /// established yet. A zero-length read or a torn-down connection is
    /// reported as [`Received::Closed`].
    pub async fn recv(&mut self) -> Result<Received> {
        match self {
            Self::Tcp(session) => session.recv().await,
            Self::Udp(session) => session.recv().await,
            Self::Quic(session) => session.recv().await,
        }
    }

    /// Replies with the acknowledgment sentinel to the established peer.
    pub async fn send_ack(&mut self) -> Result<()> {
        match self {
            Self::Tcp(session) => session.send_ack().await,
            Self::Udp(session) => session.send_ack().await,
            Self::Quic(session) => session.send_ack().await,
        }
    }

    pub async fn close(self) -> Result<()> {
        match self {
            Self::Tcp(session) => session.close().await,
            Self::Udp(session) => session.close().await,
            Self::Quic(session) => session.close().await,
        }
    }
}
