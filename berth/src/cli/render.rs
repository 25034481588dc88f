use berth_planner::ImageReference;
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
pub struct RenderCommand {
    #[arg(
        long,
        help = "Image reference to render into the deployment. Defaults to the configured \
                repository and tag."
    )]
    pub image: Option<String>,
}

impl RenderCommand {
    pub async fn run(self, config: Config) -> Result<(), Error> {
        let plan = PlanResolver::from(&config).resolve(SecretRequirement::RedactedOnly)?;
        let mut outputs = plan.planned_outputs();
        if let Some(image) = self.image {
            outputs.image = Some(ImageReference::new(image));
        }
        let rendered = plan.render(&outputs).context(error::PlannerSnafu)?;

        let mut stdout = tokio::io::stdout();
        stdout.write_all(rendered.as_bytes()).await.context(error::WriteStdoutSnafu)?;
        stdout.flush().await.context(error::WriteStdoutSnafu)
    }
}
