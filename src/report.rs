//! Machine-readable run reports.
//!
//! One JSON record per runner process. The field set is the contract the
//! matrix driver (and anything downstream of it) relies on.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    config::{Discipline, RunConfig, TransportKind},
    error::Result,
    metrics::RunMetrics,
    server::StopReason,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Server,
}

/// The report record for one runner execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub role: Role,
    pub transport: TransportKind,
    pub discipline: Discipline,
    /// Blocks transferred (sent for the client, received for the server).
    pub blocks: u64,
    /// Bytes transferred.
    pub bytes: u64,
    /// Failed transfers; present only on the datagram stop-and-wait client,
    /// the one place a failed transfer is observable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<u64>,
    /// Wall time from the first payload transfer to termination.
    pub elapsed_secs: f64,
    /// Configured totals, echoed for downstream analysis.
    pub total_size: u64,
    pub block_size: u64,
    /// How the server run ended; absent on client reports. `peer_closed`
    /// flags an incomplete run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

impl RunReport {
    pub fn client(config: &RunConfig, metrics: &RunMetrics) -> Self {
        let failed = (config.transport == TransportKind::Udp
            && config.discipline == Discipline::StopAndWait)
            .then(|| metrics.failed());
        Self {
            role: Role::Client,
            transport: config.transport,
            discipline: config.discipline,
            blocks: metrics.blocks(),
            bytes: metrics.bytes(),
            failed,
            elapsed_secs: metrics.elapsed().as_secs_f64(),
            total_size: config.total_size,
            block_size: config.block_size,
            stop_reason: None,
        }
    }

    pub fn server(config: &RunConfig, metrics: &RunMetrics, reason: StopReason) -> Self {
        Self {
            role: Role::Server,
            transport: config.transport,
            discipline: config.discipline,
            blocks: metrics.blocks(),
            bytes: metrics.bytes(),
            failed: None,
            elapsed_secs: metrics.elapsed().as_secs_f64(),
            total_size: config.total_size,
            block_size: config.block_size,
            stop_reason: Some(reason),
        }
    }

    pub async fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(transport: TransportKind, discipline: Discipline) -> RunConfig {
        RunConfig {
            transport,
            discipline,
            host: "127.0.0.1".into(),
            port: 9000,
            marker: "FIN".into(),
            total_size: 5_000,
            block_size: 1_000,
            ack_timeout_ms: 1_000,
        }
    }

    #[test]
    fn failed_count_appears_only_on_the_datagram_stop_and_wait_client() {
        let mut metrics = RunMetrics::new();
        metrics.record_block(1_000);
        metrics.record_failure();

        let udp = RunReport::client(
            &config(TransportKind::Udp, Discipline::StopAndWait),
            &metrics,
        );
        assert_eq!(udp.failed, Some(1));
        let json = serde_json::to_string(&udp).unwrap();
        assert!(json.contains("\"failed\""));

        let tcp = RunReport::client(
            &config(TransportKind::Tcp, Discipline::StopAndWait),
            &metrics,
        );
        assert_eq!(tcp.failed, None);
        let json = serde_json::to_string(&tcp).unwrap();
        assert!(!json.contains("\"failed\""));

        let streaming = RunReport::client(
            &config(TransportKind::Udp, Discipline::Streaming),
            &metrics,
        );
        assert_eq!(streaming.failed, None);
    }

    #[test]
    fn server_reports_carry_the_stop_reason() {
        let metrics = RunMetrics::new();
        let report = RunReport::server(
            &config(TransportKind::Tcp, Discipline::Streaming),
            &metrics,
            StopReason::PeerClosed,
        );
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"peer_closed\""));
        assert!(json.contains("\"server\""));
    }

    #[tokio::test]
    async fn reports_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");

        let mut metrics = RunMetrics::new();
        metrics.record_block(5_000);
        let report = RunReport::client(
            &config(TransportKind::Quic, Discipline::Streaming),
            &metrics,
        );
        report.write(&path).await.unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: RunReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.role, Role::Client);
        assert_eq!(parsed.blocks, 1);
        assert_eq!(parsed.bytes, 5_000);
        assert_eq!(parsed.stop_reason, None);
    }
}
