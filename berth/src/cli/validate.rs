use clap::Args;
use snafu::ResultExt;
use tokio::io::AsyncWriteExt;

use crate::{
    cli::{
        error::{self, Error},
        internal::{PlanResolver, SecretRequirement},
    },
    config::Config,
};

#[derive(Args, Clone)]
pub struct ValidateCommand;

impl ValidateCommand {
    pub async fn run(self, config: Config) -> Result<(), Error> {
        let plan = PlanResolver::from(&config).resolve(SecretRequirement::RedactedOnly)?;
        let summary = format!(
            "Plan for {} ({}) is valid: {} resource(s) in {} layer(s)\n",
            plan.identity().name(),
            plan.policy().variant,
            plan.graph().len(),
            plan.layers().len()
        );
        tokio::io::stdout().write_all(summary.as_bytes()).await.context(error::WriteStdoutSnafu)
    }
}
