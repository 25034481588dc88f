//! Container and deployment composition.

use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy, RollingUpdateDeployment},
        core::v1::{
            Container, ContainerPort, EnvVar, EnvVarSource, ExecAction, HTTPGetAction, Lifecycle,
            LifecycleHandler, PodSpec, PodTemplateSpec, Probe, ResourceRequirements,
            SecretKeySelector,
        },
    },
    apimachinery::pkg::{
        api::resource::Quantity,
        apis::meta::v1::{LabelSelector, ObjectMeta},
        util::intstr::IntOrString,
    },
};

use crate::{
    credential::{APPLICATION_PASSWORD_KEY, Credential},
    database::DatabaseRelease,
    identity::Identity,
    image::ImageReference,
    policy::{EnvironmentPolicy, ResourceSizing},
    topology::{HttpCheck, NamedPort, Topology},
};

/// Rollout may never drop below full capacity.
pub const ROLLOUT_MAX_UNAVAILABLE: i32 = 0;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EnvValue {
    Literal(String),
    /// Filled with the database hostname once the release is installed.
    DatabaseHost,
    SecretKey { secret_name: String, key: String },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EnvEntry {
    pub name: String,
    pub value: EnvValue,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HttpProbeSpec {
    pub path: String,
    pub port: String,
    pub initial_delay_seconds: Option<i32>,
}

impl HttpProbeSpec {
    fn from_check(check: &HttpCheck, initial_delay_seconds: Option<i32>) -> Self {
        Self { path: check.path.clone(), port: check.port.clone(), initial_delay_seconds }
    }

    fn to_probe(&self) -> Probe {
        Probe {
            http_get: Some(HTTPGetAction {
                path: Some(self.path.clone()),
                port: IntOrString::String(self.port.clone()),
                ..HTTPGetAction::default()
            }),
            initial_delay_seconds: self.initial_delay_seconds,
            ..Probe::default()
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    pub env: Vec<EnvEntry>,
    /// Declaration order is kept; the service exposes ports in this order.
    pub ports: Vec<NamedPort>,
    pub readiness: HttpProbeSpec,
    pub liveness: HttpProbeSpec,
    pub resources: Option<ResourceSizing>,
    pub pre_stop_delay_seconds: Option<u32>,
}

/// Outputs of upstream nodes a deployment needs before it can be created.
#[derive(Clone, Copy, Debug)]
pub struct ResolvedInputs<'a> {
    pub image: &'a ImageReference,
    pub database_host: &'a str,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkloadSpec {
    identity: Identity,
    replicas: i32,
    max_unavailable: i32,
    container: ContainerSpec,
}

impl WorkloadSpec {
    /// Composes the workload. The database release and the credential are
    /// required arguments, so composition cannot happen before both exist.
    #[must_use]
    pub fn compose(
        identity: &Identity,
        topology: &Topology,
        policy: &EnvironmentPolicy,
        database: &DatabaseRelease,
        credential: &Credential,
    ) -> Self {
        let env = vec![
            EnvEntry { name: topology.database.host_env.clone(), value: EnvValue::DatabaseHost },
            EnvEntry {
                name: topology.database.password_env.clone(),
                value: EnvValue::SecretKey {
                    secret_name: credential.secret_name().to_string(),
                    key: APPLICATION_PASSWORD_KEY.to_string(),
                },
            },
        ];
        tracing::debug!(
            "Composing workload {} against database host {}",
            identity.name(),
            database.hostname()
        );

        let container = ContainerSpec {
            name: identity.name().to_string(),
            env,
            ports: topology.ports.clone(),
            readiness: HttpProbeSpec::from_check(
                &topology.readiness,
                policy.probes.readiness_initial_delay_seconds,
            ),
            liveness: HttpProbeSpec::from_check(
                &topology.liveness,
                Some(policy.probes.liveness_initial_delay_seconds),
            ),
            resources: policy.resources.clone(),
            pre_stop_delay_seconds: policy.pre_stop_delay_seconds,
        };

        Self {
            identity: identity.clone(),
            replicas: topology.replicas,
            max_unavailable: ROLLOUT_MAX_UNAVAILABLE,
            container,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str { self.identity.name() }

    #[must_use]
    pub fn namespace(&self) -> &str { self.identity.namespace() }

    #[must_use]
    pub const fn replicas(&self) -> i32 { self.replicas }

    #[must_use]
    pub const fn max_unavailable(&self) -> i32 { self.max_unavailable }

    #[must_use]
    pub const fn container(&self) -> &ContainerSpec { &self.container }

    #[must_use]
    pub fn ports(&self) -> &[NamedPort] { &self.container.ports }

    #[must_use]
    pub fn selector(&self) -> LabelSelector { self.identity.selector() }

    #[must_use]
    pub fn port_named(&self, name: &str) -> Option<&NamedPort> {
        self.container.ports.iter().find(|port| port.name == name)
    }

    #[must_use]
    pub fn to_deployment(&self, inputs: ResolvedInputs<'_>) -> Deployment {
        let container = &self.container;
        let env = container
            .env
            .iter()
            .map(|entry| match &entry.value {
                EnvValue::Literal(value) => EnvVar {
                    name: entry.name.clone(),
                    value: Some(value.clone()),
                    ..EnvVar::default()
                },
                EnvValue::DatabaseHost => EnvVar {
                    name: entry.name.clone(),
                    value: Some(inputs.database_host.to_string()),
                    ..EnvVar::default()
                },
                EnvValue::SecretKey { secret_name, key } => EnvVar {
                    name: entry.name.clone(),
                    value_from: Some(EnvVarSource {
                        secret_key_ref: Some(SecretKeySelector {
                            name: secret_name.clone(),
                            key: key.clone(),
                            ..SecretKeySelector::default()
                        }),
                        ..EnvVarSource::default()
                    }),
                    ..EnvVar::default()
                },
            })
            .collect::<Vec<_>>();

        let ports = container
            .ports
            .iter()
            .map(|port| ContainerPort {
                name: Some(port.name.clone()),
                container_port: i32::from(port.port),
                ..ContainerPort::default()
            })
            .collect::<Vec<_>>();

        let lifecycle = container.pre_stop_delay_seconds.map(|seconds| Lifecycle {
            pre_stop: Some(LifecycleHandler {
                exec: Some(ExecAction {
                    command: Some(vec!["/bin/sleep".to_string(), seconds.to_string()]),
                }),
                ..LifecycleHandler::default()
            }),
            ..Lifecycle::default()
        });

        let pod_spec = PodSpec {
            containers: vec![Container {
                name: container.name.clone(),
                image: Some(inputs.image.to_string()),
                env: Some(env),
                ports: Some(ports),
                readiness_probe: Some(container.readiness.to_probe()),
                liveness_probe: Some(container.liveness.to_probe()),
                resources: container.resources.as_ref().map(resource_requirements),
                lifecycle,
                ..Container::default()
            }],
            ..PodSpec::default()
        };

        Deployment {
            metadata: self.identity.object_meta(self.identity.name()),
            spec: Some(DeploymentSpec {
                replicas: Some(self.replicas),
                selector: self.selector(),
                strategy: Some(DeploymentStrategy {
                    type_: Some("RollingUpdate".to_string()),
                    rolling_update: Some(RollingUpdateDeployment {
                        max_unavailable: Some(IntOrString::Int(self.max_unavailable)),
                        ..RollingUpdateDeployment::default()
                    }),
                }),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(self.identity.labels()),
                        ..ObjectMeta::default()
                    }),
                    spec: Some(pod_spec),
                },
                ..DeploymentSpec::default()
            }),
            ..Deployment::default()
        }
    }
}

fn resource_requirements(sizing: &ResourceSizing) -> ResourceRequirements {
    let quantities = |cpu: &str, memory: &str| {
        BTreeMap::from([
            ("cpu".to_string(), Quantity(cpu.to_string())),
            ("memory".to_string(), Quantity(memory.to_string())),
        ])
    };
    ResourceRequirements {
        requests: Some(quantities(&sizing.cpu_request, &sizing.memory_request)),
        limits: Some(quantities(&sizing.cpu_limit, &sizing.memory_limit)),
        ..ResourceRequirements::default()
    }
}
