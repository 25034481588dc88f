mod error;

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use berth_base::consts::{DEFAULT_SECRET_ENV_PREFIX, k8s::DEFAULT_ROLLOUT_TIMEOUT_SECONDS};
use berth_cli::config::LogConfig;
use berth_planner::{Topology, Variant};
use resolve_path::PathResolveExt;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

pub use self::error::Error;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Which environment policy the plan is composed with.
    #[serde(default)]
    pub environment: Variant,

    #[serde(default)]
    pub topology: Topology,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretsConfig {
    /// Secrets are read from environment variables named with this prefix
    /// followed by the upper snake case key, e.g. `BERTH_SECRET_POSTGRES_PASSWORD`.
    #[serde(default = "SecretsConfig::default_env_prefix")]
    pub env_prefix: String,
}

impl Default for SecretsConfig {
    fn default() -> Self { Self { env_prefix: Self::default_env_prefix() } }
}

impl SecretsConfig {
    fn default_env_prefix() -> String { DEFAULT_SECRET_ENV_PREFIX.to_string() }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    /// How long `apply` waits for the deployment rollout before failing.
    #[serde(default = "ClusterConfig::default_rollout_timeout_seconds")]
    pub rollout_timeout_seconds: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self { rollout_timeout_seconds: Self::default_rollout_timeout_seconds() }
    }
}

impl ClusterConfig {
    const fn default_rollout_timeout_seconds() -> u64 { DEFAULT_ROLLOUT_TIMEOUT_SECONDS }

    pub const fn rollout_timeout(&self) -> Duration {
        Duration::from_secs(self.rollout_timeout_seconds)
    }
}

impl Config {
    pub fn search_config_file_path() -> PathBuf {
        let paths = vec![Self::default_path()]
            .into_iter()
            .chain(berth_base::fallback_project_config_directories().into_iter().map(|mut path| {
                path.push(berth_base::CLI_CONFIG_NAME);
                path
            }))
            .collect::<Vec<_>>();
        for path in paths {
            let Ok(exists) = path.try_exists() else {
                continue;
            };
            if exists {
                return path;
            }
        }
        Self::default_path()
    }

    #[inline]
    pub fn default_path() -> PathBuf {
        [berth_base::PROJECT_CONFIG_DIR.to_path_buf(), PathBuf::from(berth_base::CLI_CONFIG_NAME)]
            .into_iter()
            .collect()
    }

    /// Loads the configuration at `path`. A missing file at the default
    /// location yields the built-in defaults; an explicitly given path must
    /// exist.
    pub fn load<P: AsRef<Path>>(path: P, explicit: bool) -> Result<Self, Error> {
        let path = path.as_ref();
        if !explicit && !path.try_exists().unwrap_or(false) {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let mut config: Self = {
            let path = path
                .try_resolve()
                .map(|path| path.to_path_buf())
                .with_context(|_| error::ResolveFilePathSnafu { file_path: path.to_path_buf() })?;
            let data =
                std::fs::read(&path).context(error::OpenConfigSnafu { filename: path.clone() })?;
            serde_yaml::from_slice(&data).context(error::ParseConfigSnafu { filename: path })?
        };

        config.log.file_path = match config.log.file_path.map(|path| {
            path.try_resolve()
                .map(|path| path.to_path_buf())
                .with_context(|_| error::ResolveFilePathSnafu { file_path: path.clone() })
        }) {
            Some(Ok(path)) => Some(path),
            Some(Err(err)) => return Err(err),
            None => None,
        };

        Ok(config)
    }

    pub fn template_basic() -> Result<String, Error> {
        serde_yaml::to_string(&Self::default()).context(error::SerializeConfigSnafu)
    }
}

#[cfg(test)]
mod tests {
    use berth_planner::topology::NamedPort;

    use super::*;

    #[test]
    fn test_template_round_trips_defaults() {
        let template = Config::template_basic().expect("defaults serialize");
        let config: Config = serde_yaml::from_str(&template).expect("template parses");
        assert_eq!(config.environment, Variant::Transitional);
        assert_eq!(config.topology, Topology::default());
        assert_eq!(config.secrets.env_prefix, "BERTH_SECRET_");
        assert_eq!(config.cluster.rollout_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_partial_config() {
        let yaml = "environment: hardened\ntopology:\n  replicas: 3\n  ports:\n    - name: http\n      port: 9000\n    - name: admin\n      port: 9001\n";
        let config: Config = serde_yaml::from_str(yaml).expect("partial config parses");
        assert_eq!(config.environment, Variant::Hardened);
        assert_eq!(config.topology.replicas, 3);
        assert_eq!(config.topology.ports, [NamedPort::new("http", 9000), NamedPort::new("admin", 9001)]);
        assert_eq!(config.topology.host, "chat.aaronbatilo.dev");
        assert!(config.log.emit_stderr);
        assert_eq!(config.cluster.rollout_timeout_seconds, 600);
    }

    #[test]
    fn test_rollout_timeout_override() {
        let config: Config =
            serde_yaml::from_str("cluster:\n  rolloutTimeoutSeconds: 90\n").expect("parses");
        assert_eq!(config.cluster.rollout_timeout(), Duration::from_secs(90));
    }

    #[test]
    fn test_missing_default_file_yields_defaults() {
        let config = Config::load("/nonexistent/berth/config.yaml", false).expect("defaults");
        assert_eq!(config.topology.project, "chat");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(Config::load("/nonexistent/berth/config.yaml", true).is_err());
    }
}
