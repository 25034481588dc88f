//! Kubernetes objects produced by the plan.

use k8s_openapi::{
    Resource as _,
    api::{
        apps::v1::Deployment,
        core::v1::{Namespace, Secret, Service},
        policy::v1::PodDisruptionBudget,
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::Resource;
use serde::Serialize;

use crate::edge::{IngressRoute, Middleware};

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Manifest {
    Namespace(Box<Namespace>),
    Secret(Box<Secret>),
    Deployment(Box<Deployment>),
    Service(Box<Service>),
    PodDisruptionBudget(Box<PodDisruptionBudget>),
    Middleware(Box<Middleware>),
    IngressRoute(Box<IngressRoute>),
}

impl Manifest {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Namespace(_) => Namespace::KIND,
            Self::Secret(_) => Secret::KIND,
            Self::Deployment(_) => Deployment::KIND,
            Self::Service(_) => Service::KIND,
            Self::PodDisruptionBudget(_) => PodDisruptionBudget::KIND,
            Self::Middleware(_) => "Middleware",
            Self::IngressRoute(_) => "IngressRoute",
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> { self.meta().name.as_deref() }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> { self.meta().namespace.as_deref() }

    fn meta(&self) -> &ObjectMeta {
        match self {
            Self::Namespace(object) => object.meta(),
            Self::Secret(object) => object.meta(),
            Self::Deployment(object) => object.meta(),
            Self::Service(object) => object.meta(),
            Self::PodDisruptionBudget(object) => object.meta(),
            Self::Middleware(object) => object.meta(),
            Self::IngressRoute(object) => object.meta(),
        }
    }
}
