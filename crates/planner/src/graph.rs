//! Dependency graph of planned resources.
//!
//! Nodes are grouped into layers: every node's dependencies live in earlier
//! layers. Layers fix the order in which a plan is rendered and displayed.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use snafu::ensure;

use crate::error::{self, Error};

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum NodeKind {
    Namespace,
    Secret,
    Release,
    Image,
    Deployment,
    Service,
    PodDisruptionBudget,
    Middleware,
    IngressRoute,
}

impl NodeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Secret => "secret",
            Self::Release => "release",
            Self::Image => "image",
            Self::Deployment => "deployment",
            Self::Service => "service",
            Self::PodDisruptionBudget => "poddisruptionbudget",
            Self::Middleware => "middleware",
            Self::IngressRoute => "ingressroute",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId {
    pub kind: NodeKind,
    pub name: String,
}

impl NodeId {
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self { Self { kind, name: name.into() } }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

#[derive(Clone, Debug)]
pub struct ResourceGraph<N> {
    nodes: BTreeMap<NodeId, N>,
    dependencies: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl<N> Default for ResourceGraph<N> {
    fn default() -> Self { Self { nodes: BTreeMap::new(), dependencies: BTreeMap::new() } }
}

impl<N> ResourceGraph<N> {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// # Errors
    ///
    /// Returns [`Error::DuplicateNode`] if `id` is already in the graph.
    pub fn add_node<I>(&mut self, id: NodeId, payload: N, dependencies: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = NodeId>,
    {
        ensure!(!self.nodes.contains_key(&id), error::DuplicateNodeSnafu { node: id });
        let _unused = self.dependencies.insert(id.clone(), dependencies.into_iter().collect());
        let _unused = self.nodes.insert(id, payload);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize { self.nodes.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&N> { self.nodes.get(id) }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &N)> { self.nodes.iter() }

    pub fn dependencies_of(&self, id: &NodeId) -> impl Iterator<Item = &NodeId> {
        self.dependencies.get(id).into_iter().flatten()
    }

    /// Every node that depends on `id`, directly or transitively.
    #[must_use]
    pub fn dependents_of(&self, id: &NodeId) -> BTreeSet<NodeId> {
        let mut found = BTreeSet::new();
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            for (node, dependencies) in &self.dependencies {
                if dependencies.contains(current) && found.insert(node.clone()) {
                    pending.push(node);
                }
            }
        }
        found
    }

    /// Groups nodes into layers. Nodes within a layer are ordered by id, so
    /// the result is the same for the same graph.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDependency`] if an edge points outside the
    /// graph and [`Error::DependencyCycle`] if the nodes cannot be ordered.
    pub fn layers(&self) -> Result<Vec<Vec<NodeId>>, Error> {
        for (node, dependencies) in &self.dependencies {
            if let Some(dependency) = dependencies.iter().find(|dep| !self.nodes.contains_key(*dep)) {
                return error::UnknownDependencySnafu {
                    node: node.clone(),
                    dependency: dependency.clone(),
                }
                .fail();
            }
        }

        let mut remaining = self
            .dependencies
            .iter()
            .map(|(node, dependencies)| (node, dependencies.len()))
            .collect::<BTreeMap<_, _>>();
        let mut layers = Vec::new();

        while !remaining.is_empty() {
            let ready = remaining
                .iter()
                .filter(|(_, pending)| **pending == 0)
                .map(|(node, _)| (*node).clone())
                .collect::<Vec<_>>();
            ensure!(
                !ready.is_empty(),
                error::DependencyCycleSnafu {
                    nodes: remaining.keys().map(|node| (*node).clone()).collect::<Vec<_>>()
                }
            );

            for node in &ready {
                let _unused = remaining.remove(node);
            }
            for (node, pending) in &mut remaining {
                let resolved = self
                    .dependencies_of(node)
                    .filter(|dependency| ready.contains(dependency))
                    .count();
                *pending -= resolved;
            }
            layers.push(ready);
        }

        Ok(layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(kind: NodeKind, name: &str) -> NodeId { NodeId::new(kind, name) }

    #[test]
    fn test_layers_respect_dependencies() {
        let namespace = id(NodeKind::Namespace, "chat");
        let secret = id(NodeKind::Secret, "chat-postgres");
        let release = id(NodeKind::Release, "postgres");
        let image = id(NodeKind::Image, "chat");
        let deployment = id(NodeKind::Deployment, "chat");

        let mut graph = ResourceGraph::new();
        graph.add_node(deployment.clone(), (), [image.clone(), release.clone()]).expect("add");
        graph.add_node(release.clone(), (), [namespace.clone(), secret.clone()]).expect("add");
        graph.add_node(secret.clone(), (), [namespace.clone()]).expect("add");
        graph.add_node(image.clone(), (), []).expect("add");
        graph.add_node(namespace.clone(), (), []).expect("add");

        let layers = graph.layers().expect("acyclic graph");
        assert_eq!(layers, vec![
            vec![namespace, image],
            vec![secret],
            vec![release],
            vec![deployment],
        ]);
    }

    #[test]
    fn test_duplicate_node() {
        let mut graph = ResourceGraph::new();
        graph.add_node(id(NodeKind::Service, "chat"), (), []).expect("add");
        let err = graph.add_node(id(NodeKind::Service, "chat"), (), []).expect_err("duplicate");
        assert!(matches!(err, Error::DuplicateNode { .. }));
    }

    #[test]
    fn test_unknown_dependency() {
        let mut graph = ResourceGraph::new();
        graph
            .add_node(id(NodeKind::IngressRoute, "chat"), (), [id(NodeKind::Middleware, "ratelimit")])
            .expect("add");
        let err = graph.layers().expect_err("dangling edge");
        assert!(matches!(
            err,
            Error::UnknownDependency { ref dependency, .. } if dependency.to_string() == "middleware/ratelimit"
        ));
    }

    #[test]
    fn test_cycle_is_reported() {
        let a = id(NodeKind::Deployment, "a");
        let b = id(NodeKind::Deployment, "b");
        let c = id(NodeKind::Service, "c");
        let mut graph = ResourceGraph::new();
        graph.add_node(a.clone(), (), [b.clone()]).expect("add");
        graph.add_node(b.clone(), (), [a.clone()]).expect("add");
        graph.add_node(c, (), []).expect("add");
        let err = graph.layers().expect_err("cycle");
        assert!(matches!(err, Error::DependencyCycle { ref nodes } if *nodes == vec![a, b]));
    }

    #[test]
    fn test_transitive_dependents() {
        let image = id(NodeKind::Image, "chat");
        let deployment = id(NodeKind::Deployment, "chat");
        let service = id(NodeKind::Service, "chat");
        let budget = id(NodeKind::PodDisruptionBudget, "chat");
        let mut graph = ResourceGraph::new();
        graph.add_node(image.clone(), (), []).expect("add");
        graph.add_node(deployment.clone(), (), [image.clone()]).expect("add");
        graph.add_node(service.clone(), (), [deployment.clone()]).expect("add");
        graph.add_node(budget.clone(), (), [deployment.clone()]).expect("add");

        let dependents = graph.dependents_of(&image);
        assert_eq!(dependents, BTreeSet::from([deployment, service, budget]));
        assert!(graph.dependents_of(&id(NodeKind::Service, "chat")).is_empty());
    }
}
