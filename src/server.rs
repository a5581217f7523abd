//! Server runner: consumes blocks until the termination marker, answering
//! with the acknowledgment sentinel under stop-and-wait.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    config::{Discipline, RunConfig},
    error::Result,
    metrics::RunMetrics,
    transport::{Received, ServerSession},
};

/// Why the server left its receive loop. A missing marker is deliberately
/// kept apart from a seen one: an empty read cannot distinguish "peer went
/// silent" from "peer finished without a marker", so the ambiguity is
/// reported rather than guessed away.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[display("marker seen")]
    MarkerSeen,
    #[display("peer closed")]
    PeerClosed,
}

/// Binds the configured address and runs one server benchmark.
pub async fn run(config: &RunConfig) -> Result<(RunMetrics, StopReason)> {
    config.validate()?;
    let session = ServerSession::bind(config).await?;
    info!(
        addr = %session.local_addr()?,
        transport = %config.transport,
        discipline = %config.discipline,
        "server ready"
    );
    run_with_session(config, session).await
}

/// Runs the receive loop on an already bound session. Split from [`run`] so
/// callers can bind an ephemeral port and learn the address first.
pub async fn run_with_session(
    config: &RunConfig,
    mut session: ServerSession,
) -> Result<(RunMetrics, StopReason)> {
    let mut metrics = RunMetrics::new();
    let outcome = receive(config, &mut session, &mut metrics).await;
    if let Err(e) = session.close().await {
        debug!("error closing session: {e}");
    }
    let reason = match outcome {
        Ok(reason) => reason,
        Err(e) if e.is_peer_closed() => {
            metrics.mark_end();
            warn!("connection lost before the termination marker: {e}");
            StopReason::PeerClosed
        }
        Err(e) => return Err(e),
    };

    info!(
        blocks = metrics.blocks(),
        bytes = metrics.bytes(),
        elapsed = ?metrics.elapsed(),
        %reason,
        "server finished"
    );
    Ok((metrics, reason))
}

async fn receive(
    config: &RunConfig,
    session: &mut ServerSession,
    metrics: &mut RunMetrics,
) -> Result<StopReason> {
    let acknowledge = config.discipline == Discipline::StopAndWait;
    let marker = config.marker.as_bytes();

    loop {
        match session.recv().await? {
            Received::Data(data) => {
                // The clock starts on the first receive, marker included, to
                // stay comparable with transports that have no accept step.
                metrics.mark_start();
                if data.as_slice() == marker {
                    metrics.mark_end();
                    if acknowledge {
                        // Acknowledge the marker too, so the client's final
                        // wait terminates; losing this ack is harmless.
                        if let Err(e) = session.send_ack().await {
                            debug!("failed to acknowledge the termination marker: {e}");
                        }
                    }
                    return Ok(StopReason::MarkerSeen);
                }
                metrics.record_block(data.len() as u64);
                if acknowledge {
                    session.send_ack().await?;
                }
            }
            Received::Closed => {
                metrics.mark_end();
                warn!("peer closed before the termination marker");
                return Ok(StopReason::PeerClosed);
            }
        }
    }
}
