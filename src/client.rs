//! Client runner: drives a transport session through the block plan under
//! the configured delivery discipline.

use tracing::{debug, info, warn};

use crate::{
    config::{Discipline, RunConfig, TransportKind},
    error::{BenchError, Result},
    metrics::RunMetrics,
    plan,
    transport::{AckOutcome, ClientSession, FILLER, MAX_RECV},
};

/// Runs one client benchmark: connect, send every planned block (awaiting
/// the acknowledgment sentinel between blocks under stop-and-wait), send the
/// termination marker, and report what was sent.
///
/// A peer that goes away mid-run ends the run early but not fatally: the
/// metrics gathered so far are still returned.
pub async fn run(config: &RunConfig) -> Result<RunMetrics> {
    config.validate()?;
    let plan = plan::plan_for(config)?;
    debug!(
        transport = %config.transport,
        discipline = %config.discipline,
        blocks = plan.len(),
        "client starting"
    );

    let mut session = ClientSession::connect(config).await?;
    let mut metrics = RunMetrics::new();
    let outcome = drive(config, &plan, &mut session, &mut metrics).await;
    metrics.mark_end();
    if let Err(e) = session.close().await {
        debug!("error closing session: {e}");
    }
    match outcome {
        Ok(()) => {}
        Err(e) if e.is_peer_closed() => warn!("peer closed before the run completed: {e}"),
        Err(e) => return Err(e),
    }

    info!(
        blocks = metrics.blocks(),
        bytes = metrics.bytes(),
        failed = metrics.failed(),
        elapsed = ?metrics.elapsed(),
        "client finished"
    );
    Ok(metrics)
}

async fn drive(
    config: &RunConfig,
    plan: &[u64],
    session: &mut ClientSession,
    metrics: &mut RunMetrics,
) -> Result<()> {
    // Pre-allocated filler buffer, sliced per block.
    let payload = vec![FILLER; MAX_RECV];
    let stop_and_wait = config.discipline == Discipline::StopAndWait;
    // Only the datagram binding bounds the acknowledgment wait; a lost ack
    // there would otherwise stall the run forever.
    let ack_deadline = (stop_and_wait && config.transport == TransportKind::Udp)
        .then(|| config.ack_timeout());

    // The clock starts at the first block send, not at connection open, so
    // handshake cost never biases the transport comparison.
    metrics.mark_start();

    for &len in plan {
        session.send(&payload[..len as usize]).await?;
        if stop_and_wait {
            match session.await_ack(ack_deadline).await? {
                AckOutcome::Acked => metrics.record_block(len),
                AckOutcome::TimedOut => {
                    debug!(len, "no acknowledgment before the deadline");
                    metrics.record_failure();
                }
                AckOutcome::Closed => return Err(BenchError::ConnectionClosed),
            }
        } else {
            metrics.record_block(len);
        }
    }

    session.send(config.marker.as_bytes()).await?;
    if stop_and_wait {
        match session.await_ack(ack_deadline).await? {
            AckOutcome::Acked => {}
            // The marker is not a data block, so a lost final ack is not a
            // failed transfer.
            AckOutcome::TimedOut => debug!("no acknowledgment for the termination marker"),
            AckOutcome::Closed => return Err(BenchError::ConnectionClosed),
        }
    }
    Ok(())
}
