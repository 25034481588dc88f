use std::{process::ExitStatus, time::Duration};

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to spawn `{program}`, error: {source}"))]
    SpawnCommand { program: String, source: std::io::Error },

    #[snafu(display("Failed to write to the stdin of `{program}`, error: {source}"))]
    WriteStdin { program: String, source: std::io::Error },

    #[snafu(display("`{program} {subcommand}` exited with {status}: {stderr}"))]
    CommandFailed { program: String, subcommand: String, status: ExitStatus, stderr: String },

    #[snafu(display("{kind} has no name"))]
    UnnamedObject { kind: &'static str },

    #[snafu(display("Failed to apply {kind} {name}, error: {source}"))]
    ApplyObject {
        kind: &'static str,
        name: String,
        #[snafu(source(from(kube::Error, Box::new)))]
        source: Box<kube::Error>,
    },

    #[snafu(display("Deployment {name} did not finish rolling out within {timeout:?}"))]
    RolloutTimeout { name: String, timeout: Duration },

    #[snafu(display("Deployment {name} exceeded its progress deadline"))]
    RolloutStalled { name: String },

    #[snafu(display("Failed to watch the rollout of deployment {name}, error: {source}"))]
    WatchRollout { name: String, source: kube::runtime::wait::Error },

    #[snafu(display("Failed to delete namespace {namespace}, error: {source}"))]
    DeleteNamespace {
        namespace: String,
        #[snafu(source(from(kube::Error, Box::new)))]
        source: Box<kube::Error>,
    },
}
