use clap::Args;
use snafu::ResultExt;
use tokio::io::AsyncWriteExt;

use crate::{
    cli::{
        error::{self, Error},
        internal::{PlanResolver, SecretRequirement},
    },
    config::Config,
    ui::table::PlanExt,
};

#[derive(Args, Clone)]
pub struct GraphCommand;

impl GraphCommand {
    pub async fn run(self, config: Config) -> Result<(), Error> {
        let plan = PlanResolver::from(&config).resolve(SecretRequirement::RedactedOnly)?;
        let mut stdout = tokio::io::stdout();
        stdout.write_all(plan.render_table().as_bytes()).await.context(error::WriteStdoutSnafu)?;
        stdout.write_u8(b'\n').await.context(error::WriteStdoutSnafu)
    }
}
