//! The managed PostgreSQL database, installed through its chart.

use std::collections::BTreeMap;

use serde::Serialize;
use snafu::ResultExt;

use crate::{
    credential::Credential,
    error::{self, BoxError, Error},
    identity::Identity,
    topology::{ChartRef, DatabaseSettings},
};

/// Installs a chart release and reports the release name it created.
pub trait DatabaseChart {
    /// # Errors
    ///
    /// Returns the collaborator's error when the release cannot be installed.
    async fn install(&self, release: &DatabaseRelease) -> Result<String, BoxError>;
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseValues {
    pub global: GlobalValues,
    /// Secret holding both the application and the administrative password.
    pub existing_secret: String,
    pub rbac: RbacValues,
    pub volume_permissions: VolumePermissionsValues,
    pub primary: PrimaryValues,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalValues {
    pub storage_class: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct RbacValues {
    pub create: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct VolumePermissionsValues {
    pub enabled: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryValues {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
}

/// A planned chart release scoped to the identity's namespace.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DatabaseRelease {
    namespace: String,
    release_name: String,
    chart: ChartRef,
    values: DatabaseValues,
}

impl DatabaseRelease {
    /// Plans the release. Taking a [`Credential`] means the secret has already
    /// been resolved; there is no way to provision without it.
    #[must_use]
    pub fn provision(
        identity: &Identity,
        settings: &DatabaseSettings,
        credential: &Credential,
    ) -> Self {
        let values = DatabaseValues {
            global: GlobalValues { storage_class: settings.storage_class.clone() },
            existing_secret: credential.secret_name().to_string(),
            rbac: RbacValues { create: true },
            volume_permissions: VolumePermissionsValues { enabled: true },
            primary: PrimaryValues { node_selector: settings.node_selector.clone() },
        };
        Self {
            namespace: identity.namespace().to_string(),
            release_name: settings.release.clone(),
            chart: settings.chart.clone(),
            values,
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str { &self.namespace }

    #[must_use]
    pub fn release_name(&self) -> &str { &self.release_name }

    #[must_use]
    pub const fn chart(&self) -> &ChartRef { &self.chart }

    #[must_use]
    pub const fn values(&self) -> &DatabaseValues { &self.values }

    /// In-namespace hostname of the planned release.
    #[must_use]
    pub fn hostname(&self) -> String { Self::hostname_for(&self.release_name) }

    /// The chart exposes its primary under `<release>-postgresql`.
    #[must_use]
    pub fn hostname_for(release: &str) -> String { format!("{release}-postgresql") }

    /// # Errors
    ///
    /// Returns [`Error::Serialize`] if the values cannot be encoded.
    pub fn values_yaml(&self) -> Result<String, Error> {
        serde_yaml::to_string(&self.values)
            .context(error::SerializeSnafu { what: format!("values of release {}", self.release_name) })
    }
}
