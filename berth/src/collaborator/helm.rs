use berth_planner::{BoxError, DatabaseChart, DatabaseRelease};

use super::run_command;

const HELM: &str = "helm";

/// Installs releases with `helm upgrade --install`, so installing an
/// unchanged release again is a no-op.
#[derive(Clone, Debug)]
pub struct HelmChart {
    program: String,
}

impl Default for HelmChart {
    fn default() -> Self { Self { program: HELM.to_string() } }
}

impl HelmChart {
    fn install_args(release: &DatabaseRelease) -> Vec<String> {
        let chart = release.chart();
        [
            "upgrade",
            "--install",
            release.release_name(),
            chart.name.as_str(),
            "--repo",
            chart.repository.as_str(),
            "--version",
            chart.version.as_str(),
            "--namespace",
            release.namespace(),
            "--values",
            "-",
            "--wait",
        ]
        .into_iter()
        .map(ToString::to_string)
        .collect()
    }

    async fn upgrade(&self, release: &DatabaseRelease) -> Result<String, BoxError> {
        let values = release.values_yaml()?;
        let _unused: String =
            run_command(&self.program, &Self::install_args(release), Some(&values)).await?;
        Ok(release.release_name().to_string())
    }
}

impl DatabaseChart for HelmChart {
    async fn install(&self, release: &DatabaseRelease) -> Result<String, BoxError> {
        self.upgrade(release).await
    }
}
