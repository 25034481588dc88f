use std::{fmt::Debug, time::Duration};

use berth_base::consts::k8s::FIELD_MANAGER;
use berth_planner::{BoxError, Cluster, Manifest};
use k8s_openapi::{
    NamespaceResourceScope,
    api::{apps::v1::Deployment, core::v1::Namespace},
};
use kube::{
    Api, Client, Resource,
    api::{DeleteParams, Patch, PatchParams},
    runtime::wait::{Condition, await_condition, conditions},
};
use serde::{Serialize, de::DeserializeOwned};
use snafu::{OptionExt, ResultExt};

use super::error::{self, Error};

/// Applies objects with server-side apply under a fixed field manager, so
/// applying an unchanged object again changes nothing.
///
/// A Deployment counts as applied only once its rollout has completed.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    rollout_timeout: Duration,
}

impl KubeCluster {
    pub const fn new(client: Client, rollout_timeout: Duration) -> Self {
        Self { client, rollout_timeout }
    }

    fn namespaced<K>(&self, object: &K) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        object.meta().namespace.as_deref().map_or_else(
            || Api::default_namespaced(self.client.clone()),
            |namespace| Api::namespaced(self.client.clone(), namespace),
        )
    }

    async fn apply_object<K>(api: Api<K>, object: &K, kind: &'static str) -> Result<String, Error>
    where
        K: Resource + Clone + Debug + DeserializeOwned + Serialize,
    {
        let name = object.meta().name.clone().context(error::UnnamedObjectSnafu { kind })?;
        let params = PatchParams::apply(FIELD_MANAGER).force();
        let _unused = api
            .patch(&name, &params, &Patch::Apply(object))
            .await
            .with_context(|_| error::ApplyObjectSnafu { kind, name: name.clone() })?;
        tracing::debug!("Server-side applied {kind} {name}");
        Ok(name)
    }

    /// Waits until the controller has observed the new generation and the
    /// rollout either completed or ran past its progress deadline.
    async fn await_rollout(&self, api: Api<Deployment>, name: &str) -> Result<(), Error> {
        tracing::info!(
            "Waiting up to {}s for deployment {name} to roll out",
            self.rollout_timeout.as_secs()
        );

        let completed = conditions::is_deployment_completed();
        let settled = move |deployment: Option<&Deployment>| {
            deployment.is_some_and(generation_observed)
                && (completed.matches_object(deployment) || deployment.is_some_and(rollout_stalled))
        };

        let deployment =
            tokio::time::timeout(self.rollout_timeout, await_condition(api, name, settled))
                .await
                .map_err(|_| Error::RolloutTimeout {
                    name: name.to_string(),
                    timeout: self.rollout_timeout,
                })?
                .with_context(|_| error::WatchRolloutSnafu { name: name.to_string() })?;

        if deployment.as_ref().is_some_and(rollout_stalled) {
            return error::RolloutStalledSnafu { name: name.to_string() }.fail();
        }
        tracing::info!("Deployment {name} rolled out");
        Ok(())
    }

    async fn apply_manifest(&self, manifest: &Manifest) -> Result<(), Error> {
        let kind = manifest.kind();
        let _name = match manifest {
            Manifest::Namespace(object) => {
                Self::apply_object(Api::<Namespace>::all(self.client.clone()), object.as_ref(), kind)
                    .await
            }
            Manifest::Secret(object) => {
                Self::apply_object(self.namespaced(object.as_ref()), object.as_ref(), kind).await
            }
            Manifest::Deployment(object) => {
                let api = self.namespaced(object.as_ref());
                let name = Self::apply_object(api.clone(), object.as_ref(), kind).await?;
                self.await_rollout(api, &name).await?;
                Ok(name)
            }
            Manifest::Service(object) => {
                Self::apply_object(self.namespaced(object.as_ref()), object.as_ref(), kind).await
            }
            Manifest::PodDisruptionBudget(object) => {
                Self::apply_object(self.namespaced(object.as_ref()), object.as_ref(), kind).await
            }
            Manifest::Middleware(object) => {
                Self::apply_object(self.namespaced(object.as_ref()), object.as_ref(), kind).await
            }
            Manifest::IngressRoute(object) => {
                Self::apply_object(self.namespaced(object.as_ref()), object.as_ref(), kind).await
            }
        }?;
        Ok(())
    }

    /// Removes the whole resource set by deleting its namespace.
    pub async fn delete_namespace(&self, namespace: &str) -> Result<(), Error> {
        let _unused = Api::<Namespace>::all(self.client.clone())
            .delete(namespace, &DeleteParams::foreground())
            .await
            .context(error::DeleteNamespaceSnafu { namespace })?;
        Ok(())
    }
}

impl Cluster for KubeCluster {
    async fn apply(&self, manifest: &Manifest) -> Result<(), BoxError> {
        Ok(self.apply_manifest(manifest).await?)
    }
}

fn generation_observed(deployment: &Deployment) -> bool {
    let observed = deployment.status.as_ref().and_then(|status| status.observed_generation);
    match (deployment.metadata.generation, observed) {
        (Some(generation), Some(observed)) => observed >= generation,
        (None, _) => true,
        (Some(_), None) => false,
    }
}

/// `Progressing=False` is set once the rollout exceeds its progress deadline.
fn rollout_stalled(deployment: &Deployment) -> bool {
    deployment
        .status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|condition| condition.type_ == "Progressing" && condition.status == "False")
        })
}

#[cfg(test)]
mod tests {
    use k8s_openapi::{
        api::apps::v1::{DeploymentCondition, DeploymentStatus},
        apimachinery::pkg::apis::meta::v1::ObjectMeta,
    };

    use super::*;

    fn deployment(generation: i64, observed: Option<i64>, progressing: &str, reason: &str) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some("chat".to_string()),
                generation: Some(generation),
                ..ObjectMeta::default()
            },
            status: Some(DeploymentStatus {
                observed_generation: observed,
                conditions: Some(vec![DeploymentCondition {
                    type_: "Progressing".to_string(),
                    status: progressing.to_string(),
                    reason: Some(reason.to_string()),
                    ..DeploymentCondition::default()
                }]),
                ..DeploymentStatus::default()
            }),
            ..Deployment::default()
        }
    }

    #[test]
    fn test_stalled_rollout() {
        let stalled = deployment(2, Some(2), "False", "ProgressDeadlineExceeded");
        assert!(generation_observed(&stalled));
        assert!(rollout_stalled(&stalled));

        let completed = deployment(2, Some(2), "True", "NewReplicaSetAvailable");
        assert!(!rollout_stalled(&completed));
        assert!(conditions::is_deployment_completed().matches_object(Some(&completed)));
    }

    #[test]
    fn test_previous_generation_is_not_settled() {
        let stale = deployment(3, Some(2), "True", "NewReplicaSetAvailable");
        assert!(!generation_observed(&stale));
        assert!(!generation_observed(&deployment(1, None, "True", "ReplicaSetUpdated")));
    }
}
