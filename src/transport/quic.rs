//! Multiplexed-stream binding: one reliable stream over an unreliable
//! substrate, with explicit connection plus stream setup.
//!
//! Sends enqueue data on the stream and yield without waiting for delivery
//! confirmation. Acknowledgment arrival is event-driven: a reader task
//! watches the receive half and signals a single-slot wait handle, which is
//! what keeps the one-block-in-flight contract enforceable.

use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use quinn::{Connection, Endpoint, RecvStream, SendStream};
use tokio::sync::Notify;
use tokio_util::task::AbortOnDropHandle;
use tracing::debug;

use crate::{
    error::{BenchError, Result},
    transport::{tls, AckOutcome, Received, ACK, MAX_RECV},
};

fn unspecified_for(addr: SocketAddr) -> SocketAddr {
    match addr {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    }
}

/// Single-slot wait handle fed by the stream reader task. With at most one
/// block in flight there is never more than one pending acknowledgment, so
/// the stored permit of [`Notify`] is exactly the buffer needed.
#[derive(Debug)]
struct AckWatcher {
    notify: Arc<Notify>,
    closed: Arc<AtomicBool>,
    _task: AbortOnDropHandle<()>,
}

impl AckWatcher {
    fn spawn(mut recv: RecvStream) -> Self {
        let notify = Arc::new(Notify::new());
        let closed = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn({
            let notify = notify.clone();
            let closed = closed.clone();
            async move {
                let mut buf = [0u8; ACK.len()];
                loop {
                    match recv.read_exact(&mut buf).await {
                        Ok(()) if buf == ACK => notify.notify_one(),
                        Ok(()) => {
                            debug!("ignoring unexpected payload while watching for acknowledgments");
                        }
                        Err(_) => {
                            closed.store(true, Ordering::Release);
                            notify.notify_one();
                            break;
                        }
                    }
                }
            }
        });
        Self {
            notify,
            closed,
            _task: AbortOnDropHandle::new(task),
        }
    }

    async fn wait(&self) -> AckOutcome {
        self.notify.notified().await;
        if self.closed.load(Ordering::Acquire) {
            AckOutcome::Closed
        } else {
            AckOutcome::Acked
        }
    }
}

#[derive(Debug)]
pub struct QuicClientSession {
    endpoint: Endpoint,
    conn: Connection,
    send: SendStream,
    acks: AckWatcher,
}

impl QuicClientSession {
    /// Full connection establishment, then one bidirectional stream for the
    /// whole run.
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let mut endpoint =
            Endpoint::client(unspecified_for(addr)).map_err(|e| BenchError::ConnectFailed {
                addr,
                reason: e.to_string(),
            })?;
        endpoint.set_default_client_config(tls::client_config()?);

        let conn = endpoint
            .connect(addr, tls::SERVER_NAME)
            .map_err(|e| BenchError::ConnectFailed {
                addr,
                reason: e.to_string(),
            })?
            .await
            .map_err(|e| BenchError::ConnectFailed {
                addr,
                reason: e.to_string(),
            })?;
        let (send, recv) = conn.open_bi().await?;
        let acks = AckWatcher::spawn(recv);
        Ok(Self {
            endpoint,
            conn,
            send,
            acks,
        })
    }

    /// Enqueues the payload on the stream; returns once the connection
    /// machinery has taken it, not once it is delivered.
    pub async fn send(&mut self, payload: &[u8]) -> Result<()> {
        Ok(self.send.write_all(payload).await?)
    }

    /// Suspends until the reader task observes the next acknowledgment.
    pub async fn await_ack(&mut self) -> AckOutcome {
        self.acks.wait().await
    }

    pub async fn close(mut self) -> Result<()> {
        self.send.finish().ok();
        // Wait until the peer's transport has acknowledged the stream so the
        // final writes are not discarded by the connection close.
        let _ = self.send.stopped().await;
        self.conn.close(0u32.into(), b"done");
        self.endpoint.wait_idle().await;
        Ok(())
    }
}

#[derive(Debug)]
pub struct QuicServerSession {
    endpoint: Endpoint,
    conn: Option<Connection>,
    streams: Option<(SendStream, RecvStream)>,
}

impl QuicServerSession {
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let server_config = tls::server_config()?;
        let endpoint =
            Endpoint::server(server_config, addr).map_err(|e| BenchError::BindFailed {
                addr,
                reason: e.to_string(),
            })?;
        Ok(Self {
            endpoint,
            conn: None,
            streams: None,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.endpoint.local_addr()?)
    }

    /// Accepts one connection and its stream on first use, then yields one
    /// ordered chunk per call, the closest analogue of a stream-data event.
    pub async fn recv(&mut self) -> Result<Received> {
        if self.streams.is_none() {
            let Some(incoming) = self.endpoint.accept().await else {
                return Ok(Received::Closed);
            };
            let conn = incoming.await?;
            debug!(remote = %conn.remote_address(), "accepted client connection");
            let streams = conn.accept_bi().await?;
            self.conn = Some(conn);
            self.streams = Some(streams);
        }
        let (_, recv) = self.streams.as_mut().expect("stream just accepted");
        match recv.read_chunk(MAX_RECV, true).await {
            Ok(Some(chunk)) => Ok(Received::Data(chunk.bytes.to_vec())),
            Ok(None) => Ok(Received::Closed),
            Err(
                quinn::ReadError::ConnectionLost(_)
                | quinn::ReadError::Reset(_)
                | quinn::ReadError::ClosedStream,
            ) => Ok(Received::Closed),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn send_ack(&mut self) -> Result<()> {
        match self.streams.as_mut() {
            Some((send, _)) => Ok(send.write_all(&ACK).await?),
            None => Err(BenchError::ConnectionClosed),
        }
    }

    pub async fn close(mut self) -> Result<()> {
        if let Some((mut send, _recv)) = self.streams.take() {
            send.finish().ok();
            // As on the client side: let the final acknowledgment reach the
            // peer before tearing the connection down.
            let _ = send.stopped().await;
        }
        if let Some(conn) = self.conn.take() {
            conn.close(0u32.into(), b"done");
        }
        self.endpoint.wait_idle().await;
        Ok(())
    }
}
