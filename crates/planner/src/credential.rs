//! The database credential, resolved once and handed to consumers by
//! reference.

use std::{collections::BTreeMap, fmt};

use k8s_openapi::api::core::v1::Secret;
use snafu::OptionExt;

use crate::{
    error::{self, Error},
    identity::Identity,
};

/// Key inside the credential Secret holding the application user password.
pub const APPLICATION_PASSWORD_KEY: &str = "postgresql-password";

/// Key inside the credential Secret holding the administrative password.
pub const ADMIN_PASSWORD_KEY: &str = "postgresql-postgres-password";

const REDACTED: &str = "<redacted>";

/// Supplies secret values at deploy time.
pub trait SecretProvider {
    /// # Errors
    ///
    /// Returns [`Error::MissingSecret`] when `key` is not set.
    fn require_secret(&self, key: &str) -> Result<SecretValue, Error>;
}

/// An opaque secret value. It never appears in `Debug` output and does not
/// implement `Display` or `Serialize`.
#[derive(Clone, Eq, PartialEq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }

    fn expose(&self) -> &str { &self.0 }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretValue").field(&REDACTED).finish()
    }
}

/// In-memory provider, used when secrets are already loaded.
#[derive(Clone, Debug, Default)]
pub struct StaticSecretProvider {
    values: BTreeMap<String, SecretValue>,
}

impl StaticSecretProvider {
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _unused = self.values.insert(key.into(), SecretValue::new(value));
        self
    }
}

impl SecretProvider for StaticSecretProvider {
    fn require_secret(&self, key: &str) -> Result<SecretValue, Error> {
        self.values.get(key).cloned().context(error::MissingSecretSnafu { key })
    }
}

/// Handle to the resolved database credential.
///
/// Consumers reference the Kubernetes Secret it names; the value itself is
/// only written into that Secret when the plan is applied.
#[derive(Clone, Debug)]
pub struct Credential {
    key: String,
    secret_name: String,
    value: SecretValue,
}

impl Credential {
    /// Resolves `key` from `provider`. Planning cannot start without it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSecret`] when the provider does not have `key`.
    pub fn require<P>(provider: &P, identity: &Identity, key: &str) -> Result<Self, Error>
    where
        P: SecretProvider + ?Sized,
    {
        let value = provider.require_secret(key)?;
        let secret_name = format!("{}-postgres", identity.name());
        tracing::debug!("Resolved secret '{key}' as secret/{secret_name}");
        Ok(Self { key: key.to_string(), secret_name, value })
    }

    #[must_use]
    pub fn key(&self) -> &str { &self.key }

    #[must_use]
    pub fn secret_name(&self) -> &str { &self.secret_name }

    /// The Secret as shown in rendered plans, with every value redacted.
    #[must_use]
    pub fn redacted_manifest(&self, identity: &Identity) -> Secret { self.manifest(identity, REDACTED) }

    /// The Secret submitted to the cluster. Both the application and the
    /// administrative password come from the same value.
    #[must_use]
    pub fn materialize(&self, identity: &Identity) -> Secret {
        self.manifest(identity, self.value.expose())
    }

    fn manifest(&self, identity: &Identity, value: &str) -> Secret {
        let string_data = [APPLICATION_PASSWORD_KEY, ADMIN_PASSWORD_KEY]
            .into_iter()
            .map(|key| (key.to_string(), value.to_string()))
            .collect::<BTreeMap<_, _>>();
        Secret {
            metadata: identity.object_meta(self.secret_name.clone()),
            string_data: Some(string_data),
            type_: Some("Opaque".to_string()),
            ..Secret::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_missing_secret() {
        let identity = Identity::resolve("chat");
        let err = Credential::require(&StaticSecretProvider::default(), &identity, "postgresPassword")
            .expect_err("absent secret must fail");
        assert!(matches!(err, Error::MissingSecret { ref key } if key == "postgresPassword"));
    }

    #[test]
    fn test_debug_never_prints_value() {
        let identity = Identity::resolve("chat");
        let provider = StaticSecretProvider::default().with("postgresPassword", "hunter2");
        let credential = Credential::require(&provider, &identity, "postgresPassword")
            .expect("secret is present");
        assert!(!format!("{credential:?}").contains("hunter2"));
        assert_eq!(credential.secret_name(), "chat-postgres");
    }

    #[test]
    fn test_redacted_and_materialized_manifests() {
        let identity = Identity::resolve("chat");
        let provider = StaticSecretProvider::default().with("postgresPassword", "hunter2");
        let credential = Credential::require(&provider, &identity, "postgresPassword")
            .expect("secret is present");

        let redacted = credential.redacted_manifest(&identity).string_data.unwrap_or_default();
        assert!(redacted.values().all(|value| value == REDACTED));

        let real = credential.materialize(&identity).string_data.unwrap_or_default();
        assert_eq!(real.get(APPLICATION_PASSWORD_KEY).map(String::as_str), Some("hunter2"));
        assert_eq!(real.get(ADMIN_PASSWORD_KEY), real.get(APPLICATION_PASSWORD_KEY));
    }
}
