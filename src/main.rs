use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use wirebench::{
    client,
    config::{Discipline, MatrixConfig, RunConfig, TransportKind},
    driver, logging,
    report::RunReport,
    server,
};

/// wirebench measures block-transfer throughput over TCP, UDP and QUIC.
#[derive(Parser, Debug, Clone)]
#[clap(version, verbatim_doc_comment)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Receive blocks until the termination marker and report what arrived.
    Server {
        #[clap(flatten)]
        args: RunArgs,
    },
    /// Send blocks to a server and report what was sent.
    Client {
        #[clap(flatten)]
        args: RunArgs,
    },
    /// Run the full experiment matrix, spawning a server/client pair per
    /// combination.
    Matrix {
        /// Path to a TOML matrix description; defaults are used without it.
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    #[clap(long, value_enum)]
    transport: TransportKind,

    #[clap(long, value_enum, default_value_t = Discipline::Streaming)]
    discipline: Discipline,

    #[clap(long, default_value = "127.0.0.1")]
    host: String,

    #[clap(long, default_value_t = 9000)]
    port: u16,

    /// Termination marker; must never equal a payload block.
    #[clap(long, default_value = "FIN")]
    marker: String,

    /// Total payload size in bytes.
    #[clap(long)]
    size: u64,

    /// Fixed block size in bytes; 0 selects random sizing.
    #[clap(long, default_value_t = 0)]
    block_size: u64,

    /// Deadline for the datagram stop-and-wait acknowledgment receive.
    #[clap(long, default_value_t = 1000)]
    ack_timeout_ms: u64,

    /// Write the JSON report to this file instead of logging it.
    #[clap(long)]
    report: Option<PathBuf>,
}

impl RunArgs {
    fn into_parts(self) -> (RunConfig, Option<PathBuf>) {
        let config = RunConfig {
            transport: self.transport,
            discipline: self.discipline,
            host: self.host,
            port: self.port,
            marker: self.marker,
            total_size: self.size,
            block_size: self.block_size,
            ack_timeout_ms: self.ack_timeout_ms,
        };
        (config, self.report)
    }
}

fn main() -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .thread_name("wirebench")
        .enable_all()
        .build()?;
    rt.block_on(main_impl())?;
    // Give in-flight transport teardown a moment, but do not wait forever.
    rt.shutdown_timeout(Duration::from_millis(500));
    Ok(())
}

async fn main_impl() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Server { args } => {
            let (config, report_path) = args.into_parts();
            let (metrics, reason) = server::run(&config).await?;
            emit(RunReport::server(&config, &metrics, reason), report_path).await?;
        }
        Commands::Client { args } => {
            let (config, report_path) = args.into_parts();
            let metrics = client::run(&config).await?;
            emit(RunReport::client(&config, &metrics), report_path).await?;
        }
        Commands::Matrix { config } => {
            let matrix = MatrixConfig::load(config.as_deref()).await?;
            driver::run(&matrix).await?;
        }
    }
    Ok(())
}

async fn emit(report: RunReport, path: Option<PathBuf>) -> Result<()> {
    match path {
        Some(path) => {
            report.write(&path).await?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
