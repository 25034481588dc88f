//! Dependency-driven execution of a plan against the external collaborators.

use std::collections::{BTreeMap, BTreeSet};

use futures::{StreamExt, stream::FuturesUnordered};
use snafu::ResultExt;

use crate::{
    database::{DatabaseChart, DatabaseRelease},
    error::{self, BoxError, Error},
    graph::NodeId,
    image::{ImageBuilder, ImageReference},
    manifest::Manifest,
    plan::{Node, Outputs, Plan, SecretExposure},
};

/// Submits cluster objects. Applying the same object twice must leave the
/// cluster unchanged.
pub trait Cluster {
    /// # Errors
    ///
    /// Returns the collaborator's error when the object is rejected.
    async fn apply(&self, manifest: &Manifest) -> Result<(), BoxError>;
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ApplyReport {
    pub applied: Vec<NodeId>,
    pub outputs: Outputs,
}

enum Produced {
    Nothing,
    Image(ImageReference),
    DatabaseHost(String),
}

pub struct Executor<B, C, K> {
    builder: B,
    chart: C,
    cluster: K,
}

impl<B, C, K> Executor<B, C, K>
where
    B: ImageBuilder,
    C: DatabaseChart,
    K: Cluster,
{
    pub const fn new(builder: B, chart: C, cluster: K) -> Self { Self { builder, chart, cluster } }

    /// Applies every node as soon as all of its dependencies are applied,
    /// so independent subgraphs (the database and the image) progress
    /// concurrently.
    ///
    /// When a node fails, its transitive dependents are never started.
    /// Nodes that do not depend on it still run to completion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Apply`] naming the first failed node, the nodes that
    /// were applied and the dependents that were never started.
    pub async fn apply(&self, plan: &Plan) -> Result<ApplyReport, Error> {
        let graph = plan.graph();
        let mut report = ApplyReport::default();
        let mut waiting = graph
            .iter()
            .map(|(id, _)| (id, graph.dependencies_of(id).count()))
            .collect::<BTreeMap<_, _>>();
        let mut skipped = BTreeSet::new();
        let mut failure = None;
        let mut running = FuturesUnordered::new();

        tracing::info!("Applying {} resource(s)", graph.len());

        loop {
            let ready = waiting
                .iter()
                .filter(|(_, pending)| **pending == 0)
                .map(|(id, _)| *id)
                .collect::<Vec<_>>();
            for id in ready {
                let _unused = waiting.remove(id);
                let outputs = report.outputs.clone();
                running.push(async move { (id, self.apply_node(plan, id, &outputs).await) });
            }

            let Some((id, result)) = running.next().await else {
                break;
            };

            match result {
                Ok(produced) => {
                    match produced {
                        Produced::Nothing => {}
                        Produced::Image(image) => report.outputs.image = Some(image),
                        Produced::DatabaseHost(host) => report.outputs.database_host = Some(host),
                    }
                    report.applied.push(id.clone());
                    for (node, pending) in &mut waiting {
                        if graph.dependencies_of(node).any(|dependency| dependency == id) {
                            *pending -= 1;
                        }
                    }
                }
                Err(err) => {
                    tracing::error!("{id} failed: {err}");
                    let dependents = graph.dependents_of(id);
                    for dependent in &dependents {
                        let _unused = waiting.remove(dependent);
                    }
                    if !dependents.is_empty() {
                        tracing::warn!(
                            "Skipping {} resource(s) that depend on {id}",
                            dependents.len()
                        );
                    }
                    skipped.extend(dependents);
                    if failure.is_none() {
                        failure = Some((id.clone(), err));
                    }
                }
            }
        }

        // Only reachable with a dependency the graph could not order.
        skipped.extend(waiting.into_keys().cloned());

        if let Some((node, source)) = failure {
            return Err(source).context(error::ApplySnafu {
                node,
                applied: report.applied,
                skipped: skipped.into_iter().collect::<Vec<_>>(),
            });
        }

        tracing::info!("Applied {} resource(s)", report.applied.len());
        Ok(report)
    }

    async fn apply_node(&self, plan: &Plan, id: &NodeId, outputs: &Outputs) -> Result<Produced, Error> {
        match plan.graph().node(id) {
            Some(Node::Image(build)) => {
                let reference = build.expected_reference();
                tracing::info!("Building image {reference}");
                let image = self
                    .builder
                    .build(build)
                    .await
                    .context(error::BuildImageSnafu { reference: reference.to_string() })?;
                tracing::info!("Published image {image}");
                Ok(Produced::Image(image))
            }
            Some(Node::Release(release)) => self.install(release).await,
            Some(_) => {
                if let Some(manifest) = plan.manifest_for(id, outputs, SecretExposure::Materialized)? {
                    self.cluster.apply(&manifest).await.context(error::ApplyResourceSnafu {
                        namespace: plan.identity().namespace(),
                        node: id.clone(),
                    })?;
                    tracing::debug!("Applied {id}");
                }
                Ok(Produced::Nothing)
            }
            None => Ok(Produced::Nothing),
        }
    }

    async fn install(&self, release: &DatabaseRelease) -> Result<Produced, Error> {
        tracing::info!(
            "Installing chart {} {} as release {}",
            release.chart().name,
            release.chart().version,
            release.release_name()
        );
        let release_name = self.chart.install(release).await.context(error::InstallChartSnafu {
            namespace: release.namespace(),
            release: release.release_name(),
        })?;
        Ok(Produced::DatabaseHost(DatabaseRelease::hostname_for(&release_name)))
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use tokio::sync::Notify;

    use super::*;
    use crate::{
        credential::{Credential, StaticSecretProvider},
        graph::NodeKind,
        identity::Identity,
        image::BuildSpec,
        policy::{EnvironmentPolicy, Variant},
        topology::Topology,
    };

    #[derive(Default)]
    struct Journal {
        events: Mutex<Vec<String>>,
        installed: Notify,
    }

    impl Journal {
        fn record(&self, event: String) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event);
            }
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().map(|events| events.clone()).unwrap_or_default()
        }
    }

    #[derive(Default)]
    struct FakeBuilder<'a> {
        journal: Option<&'a Journal>,
        fail: bool,
        wait_for_install: bool,
    }

    impl ImageBuilder for FakeBuilder<'_> {
        async fn build(&self, spec: &BuildSpec) -> Result<ImageReference, BoxError> {
            let Some(journal) = self.journal else {
                return Err("no journal".into());
            };
            journal.record(format!("build {}", spec.expected_reference()));
            if self.wait_for_install {
                let _unused =
                    tokio::time::timeout(Duration::from_secs(5), journal.installed.notified()).await;
            }
            journal.record(format!("built {}", spec.expected_reference()));
            if self.fail {
                return Err("docker daemon is not running".into());
            }
            Ok(ImageReference::new(format!("{}@sha256:feed", spec.repository)))
        }
    }

    struct FakeChart<'a> {
        journal: &'a Journal,
    }

    impl DatabaseChart for FakeChart<'_> {
        async fn install(&self, release: &DatabaseRelease) -> Result<String, BoxError> {
            self.journal.record(format!("install {}", release.release_name()));
            self.journal.installed.notify_one();
            Ok(release.release_name().to_string())
        }
    }

    struct FakeCluster<'a> {
        journal: &'a Journal,
        manifests: Mutex<Vec<Manifest>>,
        reject_kind: Option<&'static str>,
    }

    impl<'a> FakeCluster<'a> {
        fn new(journal: &'a Journal) -> Self {
            Self { journal, manifests: Mutex::default(), reject_kind: None }
        }
    }

    impl Cluster for FakeCluster<'_> {
        async fn apply(&self, manifest: &Manifest) -> Result<(), BoxError> {
            self.journal.record(format!(
                "apply {}/{}",
                manifest.kind(),
                manifest.name().unwrap_or_default()
            ));
            if self.reject_kind == Some(manifest.kind()) {
                return Err("rollout exceeded its progress deadline".into());
            }
            if let Ok(mut manifests) = self.manifests.lock() {
                manifests.push(manifest.clone());
            }
            Ok(())
        }
    }

    fn builder(journal: &Journal) -> FakeBuilder<'_> {
        FakeBuilder { journal: Some(journal), ..FakeBuilder::default() }
    }

    fn plan(variant: Variant) -> Plan {
        let identity = Identity::resolve("chat");
        let provider = StaticSecretProvider::default().with("postgresPassword", "hunter2");
        let credential = Credential::require(&provider, &identity, "postgresPassword")
            .expect("secret is present");
        Plan::build(identity, &Topology::default(), EnvironmentPolicy::from(variant), credential)
            .expect("default topology is valid")
    }

    fn position(events: &[String], event: &str) -> usize {
        events.iter().position(|e| e == event).unwrap_or_else(|| panic!("missing event {event}"))
    }

    #[tokio::test]
    async fn test_apply_orders_dependencies() {
        let journal = Journal::default();
        let executor =
            Executor::new(builder(&journal), FakeChart { journal: &journal }, FakeCluster::new(&journal));
        let plan = plan(Variant::Transitional);

        let report = executor.apply(&plan).await.expect("apply succeeds");
        assert_eq!(report.applied.len(), plan.graph().len());
        assert_eq!(report.outputs.image, Some(ImageReference::new("chat@sha256:feed")));
        assert_eq!(report.outputs.database_host.as_deref(), Some("postgres-postgresql"));

        let events = journal.events();
        let namespace = position(&events, "apply Namespace/chat");
        let secret = position(&events, "apply Secret/chat-postgres");
        let install = position(&events, "install postgres");
        let built = position(&events, "built chat:latest");
        let deployment = position(&events, "apply Deployment/chat");
        let route = position(&events, "apply IngressRoute/chat");
        assert!(namespace < secret && secret < install && install < deployment);
        assert!(built < deployment && deployment < route);
    }

    #[tokio::test]
    async fn test_database_installs_while_image_builds() {
        let journal = Journal::default();
        let executor = Executor::new(
            FakeBuilder { wait_for_install: true, ..builder(&journal) },
            FakeChart { journal: &journal },
            FakeCluster::new(&journal),
        );

        let _report = executor.apply(&plan(Variant::Transitional)).await.expect("apply succeeds");

        let events = journal.events();
        let build = position(&events, "build chat:latest");
        let install = position(&events, "install postgres");
        let built = position(&events, "built chat:latest");
        assert!(build < install && install < built);
    }

    #[tokio::test]
    async fn test_deployment_uses_resolved_outputs_and_real_secret() {
        let journal = Journal::default();
        let executor =
            Executor::new(builder(&journal), FakeChart { journal: &journal }, FakeCluster::new(&journal));
        let _report = executor.apply(&plan(Variant::Hardened)).await.expect("apply succeeds");

        let manifests = executor.cluster.manifests.lock().map(|m| m.clone()).unwrap_or_default();
        let deployment = manifests
            .iter()
            .find_map(|manifest| match manifest {
                Manifest::Deployment(deployment) => Some(deployment.clone()),
                _ => None,
            })
            .expect("deployment applied");
        let container = deployment
            .spec
            .and_then(|spec| spec.template.spec)
            .map(|pod| pod.containers[0].clone())
            .expect("container");
        assert_eq!(container.image.as_deref(), Some("chat@sha256:feed"));

        let secret = manifests
            .iter()
            .find_map(|manifest| match manifest {
                Manifest::Secret(secret) => secret.string_data.clone(),
                _ => None,
            })
            .expect("secret applied");
        assert!(secret.values().all(|value| value == "hunter2"));
    }

    #[tokio::test]
    async fn test_failed_build_skips_only_its_dependents() {
        let journal = Journal::default();
        let executor = Executor::new(
            FakeBuilder { wait_for_install: true, fail: true, ..builder(&journal) },
            FakeChart { journal: &journal },
            FakeCluster::new(&journal),
        );

        let err = executor.apply(&plan(Variant::Transitional)).await.expect_err("build fails");
        let Error::Apply { node, applied, skipped, source } = err else {
            panic!("unexpected error");
        };
        assert_eq!(node, NodeId::new(NodeKind::Image, "chat"));
        assert!(matches!(*source, Error::BuildImage { .. }));

        for independent in [
            NodeId::new(NodeKind::Namespace, "chat"),
            NodeId::new(NodeKind::Secret, "chat-postgres"),
            NodeId::new(NodeKind::Release, "postgres"),
            NodeId::new(NodeKind::Middleware, "ratelimit"),
            NodeId::new(NodeKind::Middleware, "chat-http-to-https"),
        ] {
            assert!(applied.contains(&independent), "{independent} should be applied");
            assert!(!skipped.contains(&independent), "{independent} should not be skipped");
        }
        assert_eq!(skipped, [
            NodeId::new(NodeKind::Deployment, "chat"),
            NodeId::new(NodeKind::Service, "chat"),
            NodeId::new(NodeKind::PodDisruptionBudget, "chat"),
            NodeId::new(NodeKind::IngressRoute, "chat"),
        ]);

        let events = journal.events();
        assert!(events.iter().any(|event| event == "install postgres"));
        assert!(!events.iter().any(|event| event.starts_with("apply Deployment")));
    }

    #[tokio::test]
    async fn test_rejected_deployment_skips_route() {
        let journal = Journal::default();
        let executor = Executor::new(
            builder(&journal),
            FakeChart { journal: &journal },
            FakeCluster { reject_kind: Some("Deployment"), ..FakeCluster::new(&journal) },
        );

        let err = executor.apply(&plan(Variant::Hardened)).await.expect_err("rollout stalls");
        let Error::Apply { node, applied, skipped, source } = err else {
            panic!("unexpected error");
        };
        assert_eq!(node, NodeId::new(NodeKind::Deployment, "chat"));
        assert!(matches!(*source, Error::ApplyResource { .. }));
        assert!(applied.contains(&NodeId::new(NodeKind::Release, "postgres")));
        assert!(applied.contains(&NodeId::new(NodeKind::Image, "chat")));
        assert!(skipped.contains(&NodeId::new(NodeKind::IngressRoute, "chat")));
        assert!(skipped.contains(&NodeId::new(NodeKind::Service, "chat")));

        let events = journal.events();
        assert!(!events.iter().any(|event| event.starts_with("apply IngressRoute")));
    }
}
