//! Declarative description of the chat deployment unit.

use std::{collections::BTreeMap, path::PathBuf};

use berth_base::consts::{DEFAULT_HOST, DEFAULT_PROJECT};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedPort {
    pub name: String,
    pub port: u16,
}

impl NamedPort {
    pub fn new(name: impl Into<String>, port: u16) -> Self { Self { name: name.into(), port } }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpCheck {
    pub path: String,
    pub port: String,
}

/// A path prefix routed from the edge to a named service port.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTarget {
    pub path_prefix: String,
    pub port: String,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRef {
    pub repository: String,
    pub name: String,
    pub version: String,
}

impl Default for ChartRef {
    fn default() -> Self {
        Self {
            repository: "https://charts.bitnami.com/bitnami".to_string(),
            name: "postgresql".to_string(),
            version: "10.3.11".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_release")]
    pub release: String,

    #[serde(default)]
    pub chart: ChartRef,

    #[serde(default = "DatabaseSettings::default_storage_class")]
    pub storage_class: String,

    #[serde(default = "DatabaseSettings::default_node_selector")]
    pub node_selector: BTreeMap<String, String>,

    #[serde(default = "DatabaseSettings::default_secret_key")]
    pub secret_key: String,

    #[serde(default = "DatabaseSettings::default_host_env")]
    pub host_env: String,

    #[serde(default = "DatabaseSettings::default_password_env")]
    pub password_env: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            release: Self::default_release(),
            chart: ChartRef::default(),
            storage_class: Self::default_storage_class(),
            node_selector: Self::default_node_selector(),
            secret_key: Self::default_secret_key(),
            host_env: Self::default_host_env(),
            password_env: Self::default_password_env(),
        }
    }
}

impl DatabaseSettings {
    fn default_release() -> String { "postgres".to_string() }

    fn default_storage_class() -> String { "gp2".to_string() }

    fn default_node_selector() -> BTreeMap<String, String> {
        BTreeMap::from([("topology.kubernetes.io/zone".to_string(), "us-west-2b".to_string())])
    }

    fn default_secret_key() -> String { "postgresPassword".to_string() }

    fn default_host_env() -> String { "CHAT_PG_HOST".to_string() }

    fn default_password_env() -> String { "CHAT_PG_PASSWORD".to_string() }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSettings {
    #[serde(default = "BuildSettings::default_context")]
    pub context: PathBuf,

    #[serde(default = "BuildSettings::default_dockerfile")]
    pub dockerfile: PathBuf,

    #[serde(default = "BuildSettings::default_repository")]
    pub repository: String,

    #[serde(default = "BuildSettings::default_tag")]
    pub tag: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            context: Self::default_context(),
            dockerfile: Self::default_dockerfile(),
            repository: Self::default_repository(),
            tag: Self::default_tag(),
        }
    }
}

impl BuildSettings {
    fn default_context() -> PathBuf { PathBuf::from(".") }

    fn default_dockerfile() -> PathBuf { PathBuf::from("Dockerfile") }

    fn default_repository() -> String { DEFAULT_PROJECT.to_string() }

    fn default_tag() -> String { "latest".to_string() }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    #[serde(default = "Topology::default_project")]
    pub project: String,

    #[serde(default = "Topology::default_host")]
    pub host: String,

    #[serde(default = "Topology::default_replicas")]
    pub replicas: i32,

    /// Container ports in declaration order: primary traffic first.
    #[serde(default = "Topology::default_ports")]
    pub ports: Vec<NamedPort>,

    #[serde(default = "Topology::default_readiness")]
    pub readiness: HttpCheck,

    #[serde(default = "Topology::default_liveness")]
    pub liveness: HttpCheck,

    #[serde(default = "Topology::default_routes")]
    pub routes: Vec<RouteTarget>,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub build: BuildSettings,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            project: Self::default_project(),
            host: Self::default_host(),
            replicas: Self::default_replicas(),
            ports: Self::default_ports(),
            readiness: Self::default_readiness(),
            liveness: Self::default_liveness(),
            routes: Self::default_routes(),
            database: DatabaseSettings::default(),
            build: BuildSettings::default(),
        }
    }
}

impl Topology {
    fn default_project() -> String { DEFAULT_PROJECT.to_string() }

    fn default_host() -> String { DEFAULT_HOST.to_string() }

    const fn default_replicas() -> i32 { 2 }

    fn default_ports() -> Vec<NamedPort> {
        vec![NamedPort::new("http", 8080), NamedPort::new("admin", 8081)]
    }

    fn default_readiness() -> HttpCheck {
        HttpCheck { path: "/check".to_string(), port: "http".to_string() }
    }

    fn default_liveness() -> HttpCheck {
        HttpCheck { path: "/healthz".to_string(), port: "admin".to_string() }
    }

    fn default_routes() -> Vec<RouteTarget> {
        vec![
            RouteTarget { path_prefix: "/".to_string(), port: "http".to_string() },
            RouteTarget { path_prefix: "/metrics".to_string(), port: "admin".to_string() },
        ]
    }
}
