//! Real implementations of the planner's external collaborators.

mod docker;
mod env_secret;
mod error;
mod helm;
mod kube_cluster;

use std::process::Stdio;

use snafu::ResultExt;
use tokio::{io::AsyncWriteExt, process::Command};

pub use self::{
    docker::DockerImageBuilder, env_secret::EnvSecretProvider, error::Error,
    helm::HelmChart, kube_cluster::KubeCluster,
};

/// Runs `program` with `args`, feeding `stdin` if given, and returns its
/// standard output.
async fn run_command(program: &str, args: &[String], stdin: Option<&str>) -> Result<String, Error> {
    let subcommand = args.first().cloned().unwrap_or_default();
    tracing::debug!("Running {program} {}", args.join(" "));

    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .context(error::SpawnCommandSnafu { program })?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input.as_bytes()).await.context(error::WriteStdinSnafu { program })?;
        drop(pipe);
    }

    let output = child.wait_with_output().await.context(error::SpawnCommandSnafu { program })?;
    snafu::ensure!(
        output.status.success(),
        error::CommandFailedSnafu {
            program,
            subcommand,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    );
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
