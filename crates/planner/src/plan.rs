//! The full resource set for one deployment unit, wired into a dependency
//! graph.

use snafu::{OptionExt, ResultExt};

use crate::{
    availability::DisruptionBudget,
    credential::Credential,
    database::DatabaseRelease,
    edge::{EdgePlan, MiddlewareDef},
    error::{self, Error},
    graph::{NodeId, NodeKind, ResourceGraph},
    identity::Identity,
    image::{BuildSpec, ImageReference},
    manifest::Manifest,
    policy::EnvironmentPolicy,
    service::ServiceEndpoint,
    topology::Topology,
    validate,
    workload::{ResolvedInputs, WorkloadSpec},
};

const DOCUMENT_SEPARATOR: &str = "---\n";

#[derive(Clone, Debug)]
pub enum Node {
    Namespace,
    Secret,
    Release(Box<DatabaseRelease>),
    Image(Box<BuildSpec>),
    Deployment(Box<WorkloadSpec>),
    Service(Box<ServiceEndpoint>),
    PodDisruptionBudget(Box<DisruptionBudget>),
    Middleware(Box<MiddlewareDef>),
    IngressRoute(Box<EdgePlan>),
}

/// Outputs produced while applying, consumed by dependent nodes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Outputs {
    pub image: Option<ImageReference>,
    pub database_host: Option<String>,
}

/// Whether the credential Secret carries its real value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SecretExposure {
    Redacted,
    Materialized,
}

#[derive(Clone, Debug)]
pub struct Plan {
    pub(crate) identity: Identity,
    pub(crate) policy: EnvironmentPolicy,
    pub(crate) credential: Credential,
    pub(crate) graph: ResourceGraph<Node>,
    pub(crate) layers: Vec<Vec<NodeId>>,
}

impl Plan {
    /// Composes every resource, wires the dependency edges and validates the
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] with every violation found, or a graph
    /// error if the edges cannot be ordered.
    pub fn build(
        identity: Identity,
        topology: &Topology,
        policy: EnvironmentPolicy,
        credential: Credential,
    ) -> Result<Self, Error> {
        let plan = Self::assemble(identity, topology, policy, credential)?;
        validate::validate(&plan)?;
        tracing::info!(
            "Planned {} resource(s) in {} layer(s) for {} ({})",
            plan.graph.len(),
            plan.layers.len(),
            plan.identity.name(),
            plan.policy.variant
        );
        Ok(plan)
    }

    pub(crate) fn assemble(
        identity: Identity,
        topology: &Topology,
        policy: EnvironmentPolicy,
        credential: Credential,
    ) -> Result<Self, Error> {
        let database = DatabaseRelease::provision(&identity, &topology.database, &credential);
        let build = BuildSpec::new(&topology.build, &policy.cache);
        let workload = WorkloadSpec::compose(&identity, topology, &policy, &database, &credential);
        let service = ServiceEndpoint::expose(&identity, &workload);
        let budget = DisruptionBudget::guard(&identity, &workload);
        let edge = EdgePlan::compose(&identity, topology, &policy, &service);

        let namespace_id = NodeId::new(NodeKind::Namespace, identity.namespace());
        let secret_id = NodeId::new(NodeKind::Secret, credential.secret_name());
        let release_id = NodeId::new(NodeKind::Release, database.release_name());
        let image_id = NodeId::new(NodeKind::Image, build.repository.clone());
        let deployment_id = NodeId::new(NodeKind::Deployment, workload.name());
        let service_id = NodeId::new(NodeKind::Service, service.name());
        let budget_id = NodeId::new(NodeKind::PodDisruptionBudget, budget.name());
        let route_id = NodeId::new(NodeKind::IngressRoute, edge.route().name.clone());
        let middleware_ids = edge
            .middlewares()
            .iter()
            .map(|middleware| NodeId::new(NodeKind::Middleware, middleware.name.clone()))
            .collect::<Vec<_>>();

        let mut graph = ResourceGraph::new();
        graph.add_node(namespace_id.clone(), Node::Namespace, [])?;
        graph.add_node(secret_id.clone(), Node::Secret, [namespace_id.clone()])?;
        graph.add_node(
            release_id.clone(),
            Node::Release(Box::new(database)),
            [namespace_id.clone(), secret_id.clone()],
        )?;
        graph.add_node(image_id.clone(), Node::Image(Box::new(build)), [])?;
        graph.add_node(
            deployment_id.clone(),
            Node::Deployment(Box::new(workload)),
            [namespace_id.clone(), image_id, release_id, secret_id],
        )?;
        graph.add_node(
            budget_id,
            Node::PodDisruptionBudget(Box::new(budget)),
            [deployment_id.clone()],
        )?;
        for (id, middleware) in middleware_ids.iter().zip(edge.middlewares()) {
            graph.add_node(
                id.clone(),
                Node::Middleware(Box::new(middleware.clone())),
                [namespace_id.clone()],
            )?;
        }
        graph.add_node(service_id.clone(), Node::Service(Box::new(service)), [deployment_id])?;
        graph.add_node(
            route_id,
            Node::IngressRoute(Box::new(edge)),
            middleware_ids.into_iter().chain(std::iter::once(service_id)),
        )?;

        let layers = graph.layers()?;
        Ok(Self { identity, policy, credential, graph, layers })
    }

    #[must_use]
    pub const fn identity(&self) -> &Identity { &self.identity }

    #[must_use]
    pub const fn policy(&self) -> &EnvironmentPolicy { &self.policy }

    #[must_use]
    pub const fn graph(&self) -> &ResourceGraph<Node> { &self.graph }

    #[must_use]
    pub fn layers(&self) -> &[Vec<NodeId>] { &self.layers }

    /// Outputs as they will be once applied: the tagged image and the
    /// hostname of the planned release.
    #[must_use]
    pub fn planned_outputs(&self) -> Outputs {
        let mut outputs = Outputs::default();
        for (_, node) in self.graph.iter() {
            match node {
                Node::Image(build) => outputs.image = Some(build.expected_reference()),
                Node::Release(release) => outputs.database_host = Some(release.hostname()),
                _ => {}
            }
        }
        outputs
    }

    /// The cluster object for `id`. Image builds and chart releases are
    /// handled by their collaborators and have no manifest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingOutput`] when a deployment is requested before
    /// its image or database host is known.
    pub fn manifest_for(
        &self,
        id: &NodeId,
        outputs: &Outputs,
        exposure: SecretExposure,
    ) -> Result<Option<Manifest>, Error> {
        let Some(node) = self.graph.node(id) else {
            return Ok(None);
        };
        let manifest = match node {
            Node::Namespace => Manifest::Namespace(Box::new(self.identity.namespace_manifest())),
            Node::Secret => Manifest::Secret(Box::new(match exposure {
                SecretExposure::Redacted => self.credential.redacted_manifest(&self.identity),
                SecretExposure::Materialized => self.credential.materialize(&self.identity),
            })),
            Node::Release(_) | Node::Image(_) => return Ok(None),
            Node::Deployment(workload) => {
                let image = outputs
                    .image
                    .as_ref()
                    .context(error::MissingOutputSnafu { node: id.clone(), output: "image" })?;
                let database_host = outputs.database_host.as_deref().context(
                    error::MissingOutputSnafu { node: id.clone(), output: "database host" },
                )?;
                Manifest::Deployment(Box::new(
                    workload.to_deployment(ResolvedInputs { image, database_host }),
                ))
            }
            Node::Service(service) => Manifest::Service(Box::new(service.to_manifest())),
            Node::PodDisruptionBudget(budget) => {
                Manifest::PodDisruptionBudget(Box::new(budget.to_manifest()))
            }
            Node::Middleware(middleware) => {
                Manifest::Middleware(Box::new(middleware.to_manifest(&self.identity)))
            }
            Node::IngressRoute(edge) => Manifest::IngressRoute(Box::new(edge.route_manifest())),
        };
        Ok(Some(manifest))
    }

    /// Renders every cluster object as multi-document YAML, in apply order.
    /// The Secret is always redacted.
    ///
    /// # Errors
    ///
    /// Returns an error if an output is missing or an object cannot be
    /// serialized.
    pub fn render(&self, outputs: &Outputs) -> Result<String, Error> {
        let mut documents = Vec::new();
        for id in self.layers.iter().flatten() {
            if let Some(manifest) = self.manifest_for(id, outputs, SecretExposure::Redacted)? {
                let document = serde_yaml::to_string(&manifest)
                    .context(error::SerializeSnafu { what: id.to_string() })?;
                documents.push(document);
            }
        }
        Ok(documents.iter().fold(String::new(), |mut rendered, document| {
            rendered.push_str(DOCUMENT_SEPARATOR);
            rendered.push_str(document);
            rendered
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        credential::StaticSecretProvider,
        edge::IngressRoute,
        policy::{EntryPoint, Variant},
    };

    fn plan(variant: Variant) -> Plan {
        let identity = Identity::resolve("chat");
        let provider = StaticSecretProvider::default().with("postgresPassword", "hunter2");
        let credential = Credential::require(&provider, &identity, "postgresPassword")
            .expect("secret is present");
        Plan::build(identity, &Topology::default(), EnvironmentPolicy::from(variant), credential)
            .expect("default topology is valid")
    }

    fn ids(layer: &[NodeId]) -> Vec<String> { layer.iter().map(ToString::to_string).collect() }

    #[test]
    fn test_layers_follow_data_dependencies() {
        let plan = plan(Variant::Transitional);
        let layers = plan.layers().iter().map(|layer| ids(layer)).collect::<Vec<_>>();
        assert_eq!(layers, vec![
            vec!["namespace/chat", "image/chat"],
            vec!["secret/chat-postgres", "middleware/chat-http-to-https", "middleware/ratelimit"],
            vec!["release/postgres"],
            vec!["deployment/chat"],
            vec!["service/chat", "poddisruptionbudget/chat"],
            vec!["ingressroute/chat"],
        ]);
    }

    #[test]
    fn test_database_and_image_are_independent() {
        let plan = plan(Variant::Hardened);
        let image = NodeId::new(NodeKind::Image, "chat");
        let release = NodeId::new(NodeKind::Release, "postgres");
        assert!(!plan.graph().dependents_of(&image).contains(&release));
        assert!(!plan.graph().dependents_of(&release).contains(&image));
        let deployment = NodeId::new(NodeKind::Deployment, "chat");
        assert!(plan.graph().dependents_of(&image).contains(&deployment));
        assert!(plan.graph().dependents_of(&release).contains(&deployment));
    }

    #[test]
    fn test_render_is_byte_identical() {
        let first = plan(Variant::Transitional);
        let second = plan(Variant::Transitional);
        let rendered = first.render(&first.planned_outputs()).expect("render");
        assert_eq!(rendered, second.render(&second.planned_outputs()).expect("render"));
        assert_eq!(rendered, first.render(&first.planned_outputs()).expect("render"));
        assert!(rendered.starts_with("---\n"));
        assert!(rendered.contains("chat:latest"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_render_uses_resolved_image() {
        let plan = plan(Variant::Hardened);
        let outputs = Outputs {
            image: Some(ImageReference::new("chat@sha256:0123")),
            ..plan.planned_outputs()
        };
        let rendered = plan.render(&outputs).expect("render");
        assert!(rendered.contains("chat@sha256:0123"));
        assert!(rendered.contains("value: postgres-postgresql"));
    }

    #[test]
    fn test_deployment_requires_outputs() {
        let plan = plan(Variant::Transitional);
        let deployment = NodeId::new(NodeKind::Deployment, "chat");
        let err = plan
            .manifest_for(&deployment, &Outputs::default(), SecretExposure::Redacted)
            .expect_err("image is not resolved");
        assert!(matches!(err, Error::MissingOutput { output: "image", .. }));
    }

    #[test]
    fn test_every_namespaced_object_uses_identity_namespace() {
        for variant in [Variant::Transitional, Variant::Hardened] {
            let plan = plan(variant);
            let outputs = plan.planned_outputs();
            for id in plan.layers().iter().flatten() {
                let manifest = plan
                    .manifest_for(id, &outputs, SecretExposure::Redacted)
                    .expect("manifest");
                if let Some(manifest) = manifest.filter(|m| !matches!(m, Manifest::Namespace(_))) {
                    assert_eq!(manifest.namespace(), Some("chat"), "{id}");
                }
            }
        }
    }

    #[test]
    fn test_variant_entry_points() {
        let route_of = |plan: &Plan| -> IngressRoute {
            let id = NodeId::new(NodeKind::IngressRoute, "chat");
            match plan.manifest_for(&id, &plan.planned_outputs(), SecretExposure::Redacted) {
                Ok(Some(Manifest::IngressRoute(route))) => *route,
                other => panic!("unexpected manifest: {other:?}"),
            }
        };

        let transitional = plan(Variant::Transitional);
        assert_eq!(route_of(&transitional).spec.entry_points, [EntryPoint::Web.as_str()]);
        assert!(transitional.policy().accepts_plaintext());

        let hardened = plan(Variant::Hardened);
        assert_eq!(route_of(&hardened).spec.entry_points, [EntryPoint::WebSecure.as_str()]);
        assert!(!hardened.graph().iter().any(|(id, _)| id.name.ends_with("-http-to-https")));
    }

    #[test]
    fn test_materialized_secret_only_on_request() {
        let plan = plan(Variant::Transitional);
        let secret = NodeId::new(NodeKind::Secret, "chat-postgres");
        let outputs = plan.planned_outputs();
        let reveal = |exposure| match plan.manifest_for(&secret, &outputs, exposure) {
            Ok(Some(Manifest::Secret(secret))) => secret.string_data.unwrap_or_default(),
            other => panic!("unexpected manifest: {other:?}"),
        };
        assert!(reveal(SecretExposure::Redacted).values().all(|value| value != "hunter2"));
        assert!(reveal(SecretExposure::Materialized).values().all(|value| value == "hunter2"));
    }
}
