//! The `berth` command line: renders, validates and applies the planned
//! resource set of the chat service.
//!
//! Typical use:
//!
//! ```bash
//! # Show the apply order
//! berth graph
//!
//! # Print every manifest for the hardened environment
//! berth --environment hardened render
//!
//! # Build, push, install and apply
//! BERTH_SECRET_POSTGRES_PASSWORD=... berth apply
//! ```

mod apply;
mod destroy;
pub mod error;
mod graph;
mod internal;
mod render;
mod validate;

use std::{io::Write, path::PathBuf};

use berth_planner::Variant;
use clap::{CommandFactory, Parser, Subcommand};
use snafu::ResultExt;
use tokio::runtime::Runtime;

pub use self::error::Error;
use self::{
    apply::ApplyCommand, destroy::DestroyCommand, graph::GraphCommand, render::RenderCommand,
    validate::ValidateCommand,
};
use crate::{config::Config, shadow};

/// Entry point of the Berth command line.
///
/// Parses the global options and dispatches to the subcommands that plan and
/// apply the chat service.
#[derive(Parser)]
#[command(
    name = berth_base::CLI_PROGRAM_NAME,
    author,
    version,
    long_version = shadow::CLAP_LONG_VERSION,
    about = "Berth: plan, render and apply the chat service topology on Kubernetes.",
    long_about = "Berth composes the namespace, database release, image build, deployment, \
                  service, disruption budget and edge routing of the chat service into a \
                  dependency graph, validates it, and applies each resource once its \
                  dependencies are in place.",
    color = clap::ColorChoice::Always
)]
pub struct Cli {
    /// The subcommand to execute.
    #[clap(subcommand)]
    commands: Option<Commands>,

    /// Path to the configuration file.
    ///
    /// Defaults to `~/.config/berth/config.yaml` or the path specified by the
    /// `BERTH_CONFIG_FILE_PATH` environment variable.
    #[clap(
        long = "config",
        short = 'c',
        env = "BERTH_CONFIG_FILE_PATH",
        help = "Specify a configuration file. Defaults to ~/.config/berth/config.yaml or \
                BERTH_CONFIG_FILE_PATH env var."
    )]
    config_file: Option<PathBuf>,

    /// Overrides the logging level from the configuration file.
    #[clap(
        long = "log-level",
        env = "BERTH_LOG_LEVEL",
        help = "Set the logging level (e.g., info, debug, trace)."
    )]
    log_level: Option<tracing::Level>,

    /// Environment variant the plan is composed with.
    ///
    /// `transitional` accepts plaintext and redirects it; `hardened` only
    /// listens on the TLS entry point.
    #[clap(
        long = "environment",
        short = 'e',
        env = "BERTH_ENVIRONMENT",
        help = "Environment policy to plan with: transitional or hardened. Overrides the \
                configuration file."
    )]
    environment: Option<Variant>,
}

/// Subcommands of the Berth CLI.
#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Displays client and server version information.
    #[command(about = "Display client and server version information")]
    Version {
        /// If true, shows only the client version and does not require a server
        /// connection.
        #[clap(long = "client", help = "If true, shows client version only (no server required).")]
        client: bool,
    },

    /// Generates a shell completion script for the specified shell.
    #[command(about = "Generate shell completion script for the specified shell (bash, zsh, fish)")]
    Completions { shell: clap_complete::Shell },

    /// Outputs the default configuration in YAML format to standard output.
    #[command(about = "Output the default configuration in YAML format")]
    DefaultConfig,

    /// Prints every planned manifest. Secret values are never shown.
    #[command(alias = "r", about = "Print every planned manifest as YAML, with the secret redacted")]
    Render(RenderCommand),

    /// Prints the dependency layers of the plan as a table.
    #[command(alias = "g", about = "Print the dependency layers of the plan")]
    Graph(GraphCommand),

    /// Plans and validates without contacting the cluster.
    #[command(about = "Plan and check referential integrity without contacting the cluster")]
    Validate(ValidateCommand),

    /// Builds the image, installs the database and applies every resource
    /// in dependency order.
    #[command(about = "Build the image, install the database and apply every resource")]
    Apply(ApplyCommand),

    /// Deletes the namespace and everything in it.
    #[command(about = "Delete the namespace and everything planned inside it")]
    Destroy(DestroyCommand),
}

impl Default for Cli {
    fn default() -> Self { Self::parse() }
}

impl Cli {
    fn load_config(&self) -> Result<Config, Error> {
        let mut config = match &self.config_file {
            Some(path) => Config::load(path, true)?,
            None => Config::load(Config::search_config_file_path(), false)?,
        };

        if let Some(log_level) = self.log_level {
            config.log.level = log_level;
        }
        if let Some(environment) = self.environment {
            config.environment = environment;
        }

        Ok(config)
    }

    fn write_stdout(bytes: &[u8]) -> Result<(), Error> {
        std::io::stdout().write_all(bytes).context(error::WriteStdoutSnafu)
    }

    pub fn run(self) -> Result<i32, Error> {
        let client_version = Self::command().get_version().unwrap_or_default().to_string();
        match self.commands {
            Some(Commands::Version { client }) if client => {
                Self::write_stdout(Self::command().render_long_version().as_bytes())?;
                Self::write_stdout(format!("Client Version: {client_version}\n").as_bytes())?;
                return Ok(0);
            }
            Some(Commands::Completions { shell }) => {
                let mut app = Self::command();
                let bin_name = app.get_name().to_string();
                clap_complete::generate(shell, &mut app, bin_name, &mut std::io::stdout());
                return Ok(0);
            }
            Some(Commands::DefaultConfig) => {
                Self::write_stdout(Config::template_basic()?.as_bytes())?;
                return Ok(0);
            }
            _ => {}
        }

        let config = self.load_config()?;
        config.log.registry();

        let fut = async move {
            match self.commands {
                Some(Commands::Render(cmd)) => cmd.run(config).await?,
                Some(Commands::Graph(cmd)) => cmd.run(config).await?,
                Some(Commands::Validate(cmd)) => cmd.run(config).await?,
                Some(Commands::Version { .. }) => {
                    let kube_client =
                        kube::Client::try_default().await.context(error::KubeConfigSnafu)?;
                    let server_version = kube_client.apiserver_version().await.map_or_else(
                        |_| "unknown".to_string(),
                        |info| format!("{}.{}", info.major, info.minor),
                    );
                    Self::write_stdout(Self::command().render_long_version().as_bytes())?;
                    Self::write_stdout(
                        format!(
                            "Client Version: {client_version}\nServer Version: {server_version}\n"
                        )
                        .as_bytes(),
                    )?;
                }
                Some(Commands::Apply(cmd)) => {
                    let kube_client =
                        kube::Client::try_default().await.context(error::KubeConfigSnafu)?;
                    cmd.run(kube_client, config).await?;
                }
                Some(Commands::Destroy(cmd)) => {
                    let kube_client =
                        kube::Client::try_default().await.context(error::KubeConfigSnafu)?;
                    cmd.run(kube_client, config).await?;
                }
                _ => {
                    let help = Self::command().render_long_help().ansi().to_string();
                    std::io::stderr()
                        .write_all(help.as_bytes())
                        .context(error::WriteStdoutSnafu)?;
                    return Ok(-1);
                }
            }

            Ok(0)
        };

        Runtime::new().context(error::InitializeTokioRuntimeSnafu)?.block_on(fut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() { Cli::command().debug_assert(); }

    #[test]
    fn test_parse_environment_override() {
        let cli = Cli::try_parse_from(["berth", "--environment", "hardened", "render", "--image", "chat@sha256:1"])
            .expect("arguments parse");
        assert_eq!(cli.environment, Some(Variant::Hardened));
        assert!(matches!(
            cli.commands,
            Some(Commands::Render(RenderCommand { image: Some(ref image) })) if image == "chat@sha256:1"
        ));
    }
}
