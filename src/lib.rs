//! Multi-transport block transfer benchmark.
//!
//! A client/server pair exchanges synthetic data blocks over TCP, UDP or a
//! QUIC stream under two delivery disciplines (streaming and stop-and-wait),
//! and a matrix driver runs the pair across a full parameter grid, collecting
//! one JSON report per runner.

pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod plan;
pub mod report;
pub mod server;
pub mod transport;
