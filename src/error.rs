//! Error taxonomy for benchmark runs.

use std::{io, net::SocketAddr};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors surfaced by the benchmark core.
///
/// Configuration errors are fatal before any network activity, and connect
/// and bind failures are fatal for the run. An acknowledgment timeout is not
/// an error: it is a recoverable outcome of the datagram stop-and-wait
/// receive, reported as a value. A peer close is an early, non-fatal end of
/// the run.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to connect to {addr}: {reason}")]
    ConnectFailed { addr: SocketAddr, reason: String },

    #[error("failed to bind {addr}: {reason}")]
    BindFailed { addr: SocketAddr, reason: String },

    #[error("peer closed the connection before the termination marker")]
    ConnectionClosed,

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("quic connection error: {0}")]
    Quic(#[from] quinn::ConnectionError),

    #[error("quic write error: {0}")]
    QuicWrite(#[from] quinn::WriteError),

    #[error("quic read error: {0}")]
    QuicRead(#[from] quinn::ReadError),

    #[error("tls setup error: {0}")]
    Tls(String),

    #[error("failed to encode report: {0}")]
    Report(#[from] serde_json::Error),
}

impl BenchError {
    /// Whether the error means the peer is gone rather than the run being
    /// misconfigured or the local host failing. Runners treat these as an
    /// early end of the run and still report the metrics gathered so far.
    pub fn is_peer_closed(&self) -> bool {
        match self {
            Self::ConnectionClosed => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::UnexpectedEof
            ),
            Self::Quic(_) | Self::QuicWrite(_) | Self::QuicRead(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_close_classification() {
        assert!(BenchError::ConnectionClosed.is_peer_closed());
        assert!(
            BenchError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "gone")).is_peer_closed()
        );
        assert!(!BenchError::InvalidConfig("bad".into()).is_peer_closed());
        assert!(
            !BenchError::Io(io::Error::new(io::ErrorKind::AddrInUse, "busy")).is_peer_closed()
        );
    }
}
