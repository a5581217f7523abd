//! Tracing setup shared by the benchmark binaries.

use tracing_subscriber::EnvFilter;

/// Initializes the global subscriber. Logs go to stderr so report output on
/// stdout stays machine-readable; `RUST_LOG` overrides the default level.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
