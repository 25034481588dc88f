use snafu::Snafu;

use crate::{graph::NodeId, validate::Violation};

/// Boxed error returned by the external collaborators (image build, chart
/// install, cluster API).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Required secret '{key}' is not set"))]
    MissingSecret { key: String },

    #[snafu(display("Output '{output}' required by {node} has not been resolved"))]
    MissingOutput { node: NodeId, output: &'static str },

    #[snafu(display("Resource {node} is declared more than once"))]
    DuplicateNode { node: NodeId },

    #[snafu(display("Resource {node} depends on {dependency}, which is not part of the graph"))]
    UnknownDependency { node: NodeId, dependency: NodeId },

    #[snafu(display("Dependency cycle detected among {}", join_nodes(nodes)))]
    DependencyCycle { nodes: Vec<NodeId> },

    #[snafu(display(
        "Resource graph failed validation with {} violation(s):\n{}",
        violations.len(),
        violations.iter().map(|v| format!("  - {v}")).collect::<Vec<_>>().join("\n")
    ))]
    Validation { violations: Vec<Violation> },

    #[snafu(display("Failed to serialize {what}, error: {source}"))]
    Serialize { what: String, source: serde_yaml::Error },

    #[snafu(display("Failed to build image {reference}, error: {source}"))]
    BuildImage { reference: String, source: BoxError },

    #[snafu(display(
        "Failed to install release {release} in namespace {namespace}, error: {source}"
    ))]
    InstallChart { namespace: String, release: String, source: BoxError },

    #[snafu(display("Failed to apply {node} in namespace {namespace}, error: {source}"))]
    ApplyResource { namespace: String, node: NodeId, source: BoxError },

    #[snafu(display(
        "Apply stopped at {node}: {} resource(s) left in place, {} dependent(s) not created, \
         error: {source}",
        applied.len(),
        skipped.len()
    ))]
    Apply {
        node: NodeId,
        applied: Vec<NodeId>,
        skipped: Vec<NodeId>,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },
}

fn join_nodes(nodes: &[NodeId]) -> String {
    nodes.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
