//! Referential checks run on a plan before anything reaches the cluster.

use std::collections::BTreeSet;

use snafu::Snafu;

use crate::{
    availability::BUDGET_MAX_UNAVAILABLE,
    edge::{EdgePlan, MiddlewareKind},
    error::{self, Error},
    graph::{NodeId, NodeKind, ResourceGraph},
    plan::{Node, Plan},
    workload::{ROLLOUT_MAX_UNAVAILABLE, WorkloadSpec},
};

#[derive(Clone, Debug, Eq, PartialEq, Snafu)]
pub enum Violation {
    #[snafu(display("{node} is placed in namespace '{namespace}', expected '{expected}'"))]
    NamespaceMismatch { node: NodeId, namespace: String, expected: String },

    #[snafu(display("{probe} probe of {node} targets unknown port '{port}'"))]
    UnknownProbePort { node: NodeId, probe: &'static str, port: String },

    #[snafu(display("{node} declares port '{port}' more than once"))]
    DuplicatePort { node: NodeId, port: String },

    #[snafu(display("{node} references middleware '{middleware}', which is not planned"))]
    UnknownMiddleware { node: NodeId, middleware: String },

    #[snafu(display("{node} routes to service '{service}', which is not planned"))]
    UnknownService { node: NodeId, service: String },

    #[snafu(display("{node} routes to port '{port}', which service '{service}' does not expose"))]
    UnknownServicePort { node: NodeId, service: String, port: String },

    #[snafu(display("{node} matches Host({host}) && PathPrefix({path_prefix}) more than once"))]
    DuplicateRule { node: NodeId, host: String, path_prefix: String },

    #[snafu(display("{node} redirects plaintext traffic, but no route accepts plaintext"))]
    RedirectUnreachable { node: NodeId },

    #[snafu(display("{node} runs {replicas} replica(s), at least one is required"))]
    NoReplicas { node: NodeId, replicas: i32 },

    #[snafu(display(
        "{node} allows {max_unavailable} unavailable replica(s) during rollout, expected \
         {ROLLOUT_MAX_UNAVAILABLE}"
    ))]
    RolloutNotZeroDowntime { node: NodeId, max_unavailable: i32 },

    #[snafu(display(
        "{node} allows {max_unavailable} voluntary disruption(s), expected {BUDGET_MAX_UNAVAILABLE}"
    ))]
    BudgetNotSingle { node: NodeId, max_unavailable: i32 },
}

/// Checks every referential invariant of `plan` and reports all violations
/// at once.
///
/// # Errors
///
/// Returns [`Error::Validation`] if any check fails.
pub fn validate(plan: &Plan) -> Result<(), Error> {
    let violations = collect_violations(plan);
    if violations.is_empty() {
        return Ok(());
    }
    tracing::warn!("Plan for {} has {} violation(s)", plan.identity.name(), violations.len());
    error::ValidationSnafu { violations }.fail()
}

fn collect_violations(plan: &Plan) -> Vec<Violation> {
    let expected = plan.identity.namespace();
    let graph = &plan.graph;
    let mut violations = Vec::new();
    let mut plaintext_middlewares = BTreeSet::new();

    for (id, node) in graph.iter() {
        let namespace = match node {
            Node::Release(release) => Some(release.namespace()),
            Node::Deployment(workload) => Some(workload.namespace()),
            Node::Service(service) => Some(service.namespace()),
            Node::PodDisruptionBudget(budget) => Some(budget.namespace()),
            Node::IngressRoute(edge) => Some(edge.namespace()),
            _ => None,
        };
        if let Some(namespace) = namespace.filter(|namespace| *namespace != expected) {
            violations.push(
                NamespaceMismatchSnafu { node: id.clone(), namespace, expected }.build(),
            );
        }

        match node {
            Node::Deployment(workload) => check_workload(id, workload, &mut violations),
            Node::PodDisruptionBudget(budget) => {
                if budget.max_unavailable() != BUDGET_MAX_UNAVAILABLE {
                    violations.push(
                        BudgetNotSingleSnafu {
                            node: id.clone(),
                            max_unavailable: budget.max_unavailable(),
                        }
                        .build(),
                    );
                }
            }
            Node::IngressRoute(edge) => {
                check_edge(graph, id, edge, &mut violations);
                if edge.route().entry_points.iter().any(|entry_point| entry_point.accepts_plaintext()) {
                    plaintext_middlewares
                        .extend(edge.route().rules.iter().flat_map(|rule| rule.chain.iter()));
                }
            }
            _ => {}
        }
    }

    for (id, node) in graph.iter() {
        if let Node::Middleware(middleware) = node
            && matches!(middleware.kind, MiddlewareKind::SchemeRedirect(_))
            && !plaintext_middlewares.contains(&middleware.name)
        {
            violations.push(RedirectUnreachableSnafu { node: id.clone() }.build());
        }
    }

    violations
}

fn check_workload(id: &NodeId, workload: &WorkloadSpec, violations: &mut Vec<Violation>) {
    let container = workload.container();
    for (probe, spec) in [("readiness", &container.readiness), ("liveness", &container.liveness)] {
        if workload.port_named(&spec.port).is_none() {
            violations.push(
                UnknownProbePortSnafu { node: id.clone(), probe, port: spec.port.clone() }.build(),
            );
        }
    }

    if workload.replicas() < 1 {
        violations.push(NoReplicasSnafu { node: id.clone(), replicas: workload.replicas() }.build());
    }

    let mut names = BTreeSet::new();
    let mut numbers = BTreeSet::new();
    for port in &container.ports {
        if !names.insert(port.name.as_str()) {
            violations.push(DuplicatePortSnafu { node: id.clone(), port: port.name.clone() }.build());
        }
        if !numbers.insert(port.port) {
            violations.push(
                DuplicatePortSnafu { node: id.clone(), port: port.port.to_string() }.build(),
            );
        }
    }

    if workload.max_unavailable() != ROLLOUT_MAX_UNAVAILABLE {
        violations.push(
            RolloutNotZeroDowntimeSnafu {
                node: id.clone(),
                max_unavailable: workload.max_unavailable(),
            }
            .build(),
        );
    }
}

fn check_edge(
    graph: &ResourceGraph<Node>,
    id: &NodeId,
    edge: &EdgePlan,
    violations: &mut Vec<Violation>,
) {
    let mut matches = BTreeSet::new();
    for rule in &edge.route().rules {
        for middleware in &rule.chain {
            if graph.node(&NodeId::new(NodeKind::Middleware, middleware.clone())).is_none() {
                violations.push(
                    UnknownMiddlewareSnafu { node: id.clone(), middleware: middleware.clone() }
                        .build(),
                );
            }
        }

        match graph.node(&NodeId::new(NodeKind::Service, rule.target_service.clone())) {
            Some(Node::Service(service)) => {
                if service.port_named(&rule.target_port).is_none() {
                    violations.push(
                        UnknownServicePortSnafu {
                            node: id.clone(),
                            service: rule.target_service.clone(),
                            port: rule.target_port.clone(),
                        }
                        .build(),
                    );
                }
            }
            _ => violations.push(
                UnknownServiceSnafu { node: id.clone(), service: rule.target_service.clone() }
                    .build(),
            ),
        }

        if !matches.insert((rule.host.as_str(), rule.path_prefix.as_str())) {
            violations.push(
                DuplicateRuleSnafu {
                    node: id.clone(),
                    host: rule.host.clone(),
                    path_prefix: rule.path_prefix.clone(),
                }
                .build(),
            );
        }
    }
}
