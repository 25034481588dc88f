//! Cluster-internal endpoint derived from the workload.

use k8s_openapi::{
    api::core::v1::{Service, ServicePort, ServiceSpec},
    apimachinery::pkg::util::intstr::IntOrString,
};

use crate::{identity::Identity, topology::NamedPort, workload::WorkloadSpec};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceEndpoint {
    identity: Identity,
    ports: Vec<NamedPort>,
}

impl ServiceEndpoint {
    /// Exposes every workload port, in the order the container declared them.
    #[must_use]
    pub fn expose(identity: &Identity, workload: &WorkloadSpec) -> Self {
        Self { identity: identity.clone(), ports: workload.ports().to_vec() }
    }

    #[must_use]
    pub fn name(&self) -> &str { self.identity.name() }

    #[must_use]
    pub fn namespace(&self) -> &str { self.identity.namespace() }

    #[must_use]
    pub fn ports(&self) -> &[NamedPort] { &self.ports }

    #[must_use]
    pub fn port_named(&self, name: &str) -> Option<&NamedPort> {
        self.ports.iter().find(|port| port.name == name)
    }

    #[must_use]
    pub fn port_position(&self, name: &str) -> Option<usize> {
        self.ports.iter().position(|port| port.name == name)
    }

    #[must_use]
    pub fn to_manifest(&self) -> Service {
        let ports = self
            .ports
            .iter()
            .map(|port| ServicePort {
                name: Some(port.name.clone()),
                port: i32::from(port.port),
                target_port: Some(IntOrString::String(port.name.clone())),
                protocol: Some("TCP".to_string()),
                ..ServicePort::default()
            })
            .collect();
        Service {
            metadata: self.identity.object_meta(self.identity.name()),
            spec: Some(ServiceSpec {
                selector: Some(self.identity.selector_labels()),
                ports: Some(ports),
                type_: Some("ClusterIP".to_string()),
                ..ServiceSpec::default()
            }),
            ..Service::default()
        }
    }
}
