//! Planning for the chat deployment unit: composes every resource from a
//! topology and an environment policy, orders them by their data
//! dependencies and applies them through external collaborators.

pub mod apply;
pub mod availability;
pub mod credential;
pub mod database;
pub mod edge;
mod error;
pub mod graph;
pub mod identity;
pub mod image;
pub mod manifest;
pub mod plan;
pub mod policy;
pub mod service;
pub mod topology;
pub mod validate;
pub mod workload;

pub use self::{
    apply::{ApplyReport, Cluster, Executor},
    credential::{Credential, SecretProvider, SecretValue, StaticSecretProvider},
    database::{DatabaseChart, DatabaseRelease},
    error::{BoxError, Error},
    graph::{NodeId, NodeKind},
    identity::Identity,
    image::{BuildSpec, ImageBuilder, ImageReference},
    manifest::Manifest,
    plan::{Outputs, Plan},
    policy::{EnvironmentPolicy, Variant},
    topology::Topology,
};
