//! Experiment driver: enumerates the parameter matrix and runs a
//! server/client process pair per combination under a wall-clock budget.

use std::{path::Path, process::Stdio};

use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::{
    config::{MatrixConfig, RunConfig},
    error::Result,
    report::Role,
};

/// Runs the whole matrix. The results directory is recreated once at
/// startup; every run leaves one report file per role, named
/// `{role}_{transport}_{discipline}_{size}_{block}_{iteration}.json`.
pub async fn run(matrix: &MatrixConfig) -> Result<()> {
    let exe = std::env::current_exe()?;
    if matrix.results_dir.exists() {
        tokio::fs::remove_dir_all(&matrix.results_dir).await?;
    }
    tokio::fs::create_dir_all(&matrix.results_dir).await?;

    for iteration in 0..matrix.iterations {
        for &transport in &matrix.transports {
            for &discipline in &matrix.disciplines {
                for &size in &matrix.sizes {
                    for &block_size in &matrix.block_sizes {
                        let run = matrix.run_config(transport, discipline, size, block_size);
                        if let Err(e) = run.validate() {
                            warn!(
                                %transport, %discipline, size, block_size,
                                "skipping combination: {e}"
                            );
                            continue;
                        }
                        let tag = run_tag(&run, iteration);
                        info!(%tag, "running benchmark");
                        execute_run(&exe, matrix, &run, &tag).await?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn run_tag(run: &RunConfig, iteration: u32) -> String {
    format!(
        "{}_{}_{}_{}_{}",
        run.transport, run.discipline, run.total_size, run.block_size, iteration
    )
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::Client => "client",
        Role::Server => "server",
    }
}

async fn execute_run(exe: &Path, matrix: &MatrixConfig, run: &RunConfig, tag: &str) -> Result<()> {
    let mut server = spawn_runner(exe, Role::Server, matrix, run, tag)?;
    // Give the server time to bind before the client dials.
    tokio::time::sleep(matrix.startup_delay()).await;
    let mut client = spawn_runner(exe, Role::Client, matrix, run, tag)?;

    let budget = matrix.run_budget();
    let waited = tokio::time::timeout(budget, async {
        tokio::try_join!(server.wait(), client.wait())
    })
    .await;

    match waited {
        Ok(Ok((server_status, client_status))) => {
            if !server_status.success() || !client_status.success() {
                warn!(
                    %tag,
                    server = %server_status,
                    client = %client_status,
                    "run reported failure"
                );
            }
        }
        Ok(Err(e)) => warn!(%tag, "failed to await benchmark processes: {e}"),
        Err(_) => {
            warn!(%tag, budget_secs = budget.as_secs(), "run exceeded its budget, killing");
            server.start_kill().ok();
            client.start_kill().ok();
            server.wait().await.ok();
            client.wait().await.ok();
        }
    }
    Ok(())
}

fn spawn_runner(
    exe: &Path,
    role: Role,
    matrix: &MatrixConfig,
    run: &RunConfig,
    tag: &str,
) -> Result<Child> {
    let report = matrix
        .results_dir
        .join(format!("{}_{tag}.json", role_name(role)));
    let mut command = Command::new(exe);
    command
        .arg(role_name(role))
        .arg("--transport")
        .arg(run.transport.to_string())
        .arg("--discipline")
        .arg(run.discipline.to_string())
        .arg("--host")
        .arg(&run.host)
        .arg("--port")
        .arg(run.port.to_string())
        .arg("--marker")
        .arg(&run.marker)
        .arg("--size")
        .arg(run.total_size.to_string())
        .arg("--block-size")
        .arg(run.block_size.to_string())
        .arg("--ack-timeout-ms")
        .arg(run.ack_timeout_ms.to_string())
        .arg("--report")
        .arg(&report)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    Ok(command.spawn()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Discipline, TransportKind};

    #[test]
    fn run_tags_encode_every_matrix_dimension() {
        let matrix = MatrixConfig::default();
        let run = matrix.run_config(
            TransportKind::Quic,
            Discipline::StopAndWait,
            1_000_000,
            16_384,
        );
        assert_eq!(run_tag(&run, 7), "quic_stop-and-wait_1000000_16384_7");
    }
}
