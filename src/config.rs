//! Run and experiment-matrix configuration.

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{BenchError, Result},
    transport::{ACK, FILLER, MAX_DATAGRAM_PAYLOAD, MAX_RECV},
};

/// The transport a benchmark run exercises.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Reliable, ordered byte stream (connect / bind+listen+accept-one).
    #[display("tcp")]
    Tcp,
    /// Best-effort datagrams, no handshake on either side.
    #[display("udp")]
    Udp,
    /// One reliable stream multiplexed over an unreliable substrate.
    #[display("quic")]
    Quic,
}

/// How blocks are delivered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "kebab-case")]
pub enum Discipline {
    /// Send and forget; no per-block acknowledgment.
    #[display("streaming")]
    Streaming,
    /// At most one block in flight; each send waits for the acknowledgment
    /// sentinel before the next.
    #[display("stop-and-wait")]
    StopAndWait,
}

/// Immutable configuration for one benchmark run.
///
/// Constructed once per process invocation (from the CLI, or from a
/// [`MatrixConfig`] combination) and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub transport: TransportKind,
    pub discipline: Discipline,
    pub host: String,
    pub port: u16,
    /// Termination marker, agreed between client and server. Never equal to
    /// a payload block: payloads are filler bytes, and [`validate`] rejects
    /// markers made of filler only.
    ///
    /// [`validate`]: RunConfig::validate
    pub marker: String,
    /// Total payload size in bytes.
    pub total_size: u64,
    /// Fixed block size in bytes; 0 selects random block sizing.
    pub block_size: u64,
    /// Deadline for the datagram stop-and-wait acknowledgment receive.
    pub ack_timeout_ms: u64,
}

impl RunConfig {
    /// Rejects configurations the runners cannot execute. Called before any
    /// network activity.
    pub fn validate(&self) -> Result<()> {
        if self.total_size == 0 {
            return Err(BenchError::InvalidConfig(
                "total size must be positive".into(),
            ));
        }
        if self.marker.is_empty() {
            return Err(BenchError::InvalidConfig(
                "termination marker must not be empty".into(),
            ));
        }
        if self.marker.bytes().all(|b| b == FILLER) {
            return Err(BenchError::InvalidConfig(
                "termination marker must be distinguishable from payload filler".into(),
            ));
        }
        if self.marker.as_bytes() == ACK {
            return Err(BenchError::InvalidConfig(
                "termination marker must differ from the acknowledgment sentinel".into(),
            ));
        }
        if self.block_size > 0 {
            if self.block_size > MAX_RECV as u64 {
                return Err(BenchError::InvalidConfig(format!(
                    "block size {} exceeds the {} byte send buffer",
                    self.block_size, MAX_RECV
                )));
            }
            if self.transport == TransportKind::Udp && self.block_size > MAX_DATAGRAM_PAYLOAD {
                return Err(BenchError::InvalidConfig(format!(
                    "block size {} exceeds the {} byte datagram payload ceiling",
                    self.block_size, MAX_DATAGRAM_PAYLOAD
                )));
            }
        }
        Ok(())
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Resolves the configured host and port to a socket address.
    pub async fn resolve(&self) -> Result<SocketAddr> {
        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await?
            .next()
            .ok_or_else(|| {
                BenchError::InvalidConfig(format!("cannot resolve host {:?}", self.host))
            })
    }
}

/// The full experiment matrix the driver enumerates, loaded from a TOML file
/// or defaulted when none is given.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatrixConfig {
    pub transports: Vec<TransportKind>,
    pub disciplines: Vec<Discipline>,
    /// Total payload sizes in bytes.
    pub sizes: Vec<u64>,
    /// Block sizes in bytes; 0 selects random sizing.
    pub block_sizes: Vec<u64>,
    /// How many times the whole grid is repeated.
    pub iterations: u32,
    pub host: String,
    pub port: u16,
    pub marker: String,
    pub ack_timeout_ms: u64,
    /// Hard wall-clock budget per run; both processes are killed beyond it.
    pub run_timeout_secs: u64,
    /// Delay between spawning the server and the client.
    pub startup_delay_ms: u64,
    pub results_dir: PathBuf,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            transports: vec![TransportKind::Tcp, TransportKind::Udp, TransportKind::Quic],
            disciplines: vec![Discipline::Streaming, Discipline::StopAndWait],
            sizes: vec![1_000_000, 10_000_000],
            block_sizes: vec![0, 1_000, 16_384],
            iterations: 3,
            host: "127.0.0.1".into(),
            port: 9000,
            marker: "FIN".into(),
            ack_timeout_ms: 1_000,
            run_timeout_secs: 60,
            startup_delay_ms: 2_000,
            results_dir: PathBuf::from("results"),
        }
    }
}

impl MatrixConfig {
    /// Loads the matrix from a TOML file, or the defaults when `path` is
    /// `None`.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path).await?;
                toml::from_str(&raw).map_err(|e| {
                    BenchError::InvalidConfig(format!("{}: {e}", path.display()))
                })
            }
            None => Ok(Self::default()),
        }
    }

    /// The run configuration for one matrix combination.
    pub fn run_config(
        &self,
        transport: TransportKind,
        discipline: Discipline,
        total_size: u64,
        block_size: u64,
    ) -> RunConfig {
        RunConfig {
            transport,
            discipline,
            host: self.host.clone(),
            port: self.port,
            marker: self.marker.clone(),
            total_size,
            block_size,
            ack_timeout_ms: self.ack_timeout_ms,
        }
    }

    pub fn run_budget(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RunConfig {
        RunConfig {
            transport: TransportKind::Tcp,
            discipline: Discipline::Streaming,
            host: "127.0.0.1".into(),
            port: 9000,
            marker: "FIN".into(),
            total_size: 5_000,
            block_size: 1_000,
            ack_timeout_ms: 1_000,
        }
    }

    #[test]
    fn accepts_a_plain_run() {
        config().validate().unwrap();
    }

    #[test]
    fn rejects_zero_total_size() {
        let cfg = RunConfig {
            total_size: 0,
            ..config()
        };
        assert!(matches!(cfg.validate(), Err(BenchError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_markers_that_look_like_payload() {
        let empty = RunConfig {
            marker: String::new(),
            ..config()
        };
        assert!(empty.validate().is_err());

        let filler = RunConfig {
            marker: "0000".into(),
            ..config()
        };
        assert!(filler.validate().is_err());

        let ack = RunConfig {
            marker: "ACK".into(),
            ..config()
        };
        assert!(ack.validate().is_err());
    }

    #[test]
    fn rejects_oversized_datagram_blocks() {
        let cfg = RunConfig {
            transport: TransportKind::Udp,
            block_size: 65_001,
            ..config()
        };
        assert!(cfg.validate().is_err());

        // The same block size is fine on the stream transport, which is only
        // bounded by the send buffer.
        let cfg = RunConfig {
            transport: TransportKind::Tcp,
            block_size: 65_001,
            ..config()
        };
        cfg.validate().unwrap();

        let cfg = RunConfig {
            transport: TransportKind::Tcp,
            block_size: 65_536,
            ..config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn matrix_defaults_produce_valid_runs() {
        let matrix = MatrixConfig::default();
        let run = matrix.run_config(
            TransportKind::Udp,
            Discipline::StopAndWait,
            5_000,
            1_000,
        );
        run.validate().unwrap();
    }

    #[test]
    fn matrix_parses_partial_toml() {
        let matrix: MatrixConfig = toml::from_str(
            r#"
            transports = ["udp"]
            disciplines = ["stop-and-wait"]
            sizes = [5000]
            block_sizes = [1000]
            iterations = 1
            "#,
        )
        .unwrap();
        assert_eq!(matrix.transports, vec![TransportKind::Udp]);
        assert_eq!(matrix.disciplines, vec![Discipline::StopAndWait]);
        assert_eq!(matrix.iterations, 1);
        // Unset fields fall back to the defaults.
        assert_eq!(matrix.marker, "FIN");
        assert_eq!(matrix.run_timeout_secs, 60);
    }
}
