//! Per-run metric accumulation.

use std::time::{Duration, Instant};

/// Accumulator for one runner execution: block and byte totals, failed
/// transfers, and the run clock.
///
/// The clock starts at the first payload transfer rather than at connection
/// setup, so connection-establishment cost does not bias comparisons between
/// transports with different handshake costs. The clocks are instance
/// fields, so several runs can execute within one process.
#[derive(Debug, Default)]
pub struct RunMetrics {
    blocks: u64,
    bytes: u64,
    failed: u64,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the run clock. Only the first call has an effect, so callers
    /// can invoke it on every receive and the clock still anchors to the
    /// first payload.
    pub fn mark_start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    /// Stops the run clock. Idempotent, mirroring [`mark_start`].
    ///
    /// [`mark_start`]: RunMetrics::mark_start
    pub fn mark_end(&mut self) {
        if self.finished_at.is_none() {
            self.finished_at = Some(Instant::now());
        }
    }

    pub fn record_block(&mut self, len: u64) {
        self.blocks += 1;
        self.bytes += len;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Elapsed time between the first payload transfer and the end of the
    /// run; zero when the run never transferred anything.
    pub fn elapsed(&self) -> Duration {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => finished.duration_since(started),
            _ => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_anchors_to_the_first_start() {
        let mut metrics = RunMetrics::new();
        metrics.mark_start();
        let first = metrics.started_at;
        metrics.mark_start();
        assert_eq!(metrics.started_at, first);
    }

    #[test]
    fn elapsed_is_zero_without_a_transfer() {
        let metrics = RunMetrics::new();
        assert_eq!(metrics.elapsed(), Duration::ZERO);

        let mut ended_only = RunMetrics::new();
        ended_only.mark_end();
        assert_eq!(ended_only.elapsed(), Duration::ZERO);
    }

    #[test]
    fn counters_accumulate() {
        let mut metrics = RunMetrics::new();
        metrics.record_block(1_000);
        metrics.record_block(500);
        metrics.record_failure();
        assert_eq!(metrics.blocks(), 2);
        assert_eq!(metrics.bytes(), 1_500);
        assert_eq!(metrics.failed(), 1);
    }
}
