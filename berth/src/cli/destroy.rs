use berth_planner::Identity;
use clap::Args;

use crate::{cli::error::Error, collaborator::KubeCluster, config::Config};

#[derive(Args, Clone)]
pub struct DestroyCommand;

impl DestroyCommand {
    /// Deletes the namespace, and with it every namespaced resource and the
    /// database release.
    pub async fn run(self, kube_client: kube::Client, config: Config) -> Result<(), Error> {
        let identity = Identity::resolve(config.topology.project);
        tracing::info!("Deleting namespace {}", identity.namespace());
        KubeCluster::new(kube_client, config.cluster.rollout_timeout())
            .delete_namespace(identity.namespace())
            .await?;
        Ok(())
    }
}
