use berth_planner::{ApplyReport, Cluster, DatabaseChart, Executor, ImageBuilder};
use clap::Args;
use snafu::ResultExt;
use tokio::io::AsyncWriteExt;

use crate::{
    cli::{
        error::{self, Error},
        internal::{PlanResolver, SecretRequirement},
    },
    collaborator::{DockerImageBuilder, HelmChart, KubeCluster},
    config::Config,
};

#[derive(Args, Clone)]
pub struct ApplyCommand;

impl ApplyCommand {
    pub async fn run(self, kube_client: kube::Client, config: Config) -> Result<(), Error> {
        let executor = Executor::new(
            DockerImageBuilder::default(),
            HelmChart::default(),
            KubeCluster::new(kube_client, config.cluster.rollout_timeout()),
        );
        let report = provision(&config, &executor).await?;

        let mut summary = format!("Applied {} resource(s)\n", report.applied.len());
        if let Some(image) = &report.outputs.image {
            summary.push_str(&format!("Image: {image}\n"));
        }
        if let Some(host) = &report.outputs.database_host {
            summary.push_str(&format!("Database host: {host}\n"));
        }
        tokio::io::stdout().write_all(summary.as_bytes()).await.context(error::WriteStdoutSnafu)
    }
}

/// Resolves the plan with the real secret and applies it. A missing secret
/// fails here, before any collaborator is called.
async fn provision<B, C, K>(config: &Config, executor: &Executor<B, C, K>) -> Result<ApplyReport, Error>
where
    B: ImageBuilder,
    C: DatabaseChart,
    K: Cluster,
{
    let plan = PlanResolver::from(config).resolve(SecretRequirement::Required)?;
    executor.apply(&plan).await.context(error::PlannerSnafu)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use berth_planner::{
        BoxError, BuildSpec, DatabaseRelease, Error as PlannerError, ImageReference, Manifest,
    };

    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn record(&self, call: String) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }
    }

    impl ImageBuilder for &Recorder {
        async fn build(&self, spec: &BuildSpec) -> Result<ImageReference, BoxError> {
            self.record(format!("build {}", spec.expected_reference()));
            Ok(spec.expected_reference())
        }
    }

    impl DatabaseChart for &Recorder {
        async fn install(&self, release: &DatabaseRelease) -> Result<String, BoxError> {
            self.record(format!("install {}", release.release_name()));
            Ok(release.release_name().to_string())
        }
    }

    impl Cluster for &Recorder {
        async fn apply(&self, manifest: &Manifest) -> Result<(), BoxError> {
            self.record(format!("apply {}", manifest.kind()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_missing_secret_stops_before_any_call() {
        let mut config = Config::default();
        config.secrets.env_prefix = "BERTH_TEST_APPLY_UNSET_".to_string();
        let recorder = Recorder::default();
        let executor = Executor::new(&recorder, &recorder, &recorder);

        let err = provision(&config, &executor).await.expect_err("secret is not set");
        assert!(matches!(
            err,
            Error::Planner { source: PlannerError::MissingSecret { ref key } } if key == "postgresPassword"
        ));
        assert!(recorder.calls().is_empty());
    }
}
