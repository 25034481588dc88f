use berth_planner::{
    Credential, EnvironmentPolicy, Identity, Plan, StaticSecretProvider,
};
use snafu::ResultExt;

use crate::{
    cli::error::{self, Error},
    collaborator::EnvSecretProvider,
    config::Config,
};

/// Stands in for the credential when only redacted output is produced.
const PLACEHOLDER_SECRET: &str = "unresolved";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SecretRequirement {
    /// The secret must be set; the plan will be applied.
    Required,
    /// The secret is only shown redacted, so a placeholder is used when it
    /// is not set.
    RedactedOnly,
}

/// Builds the plan described by the configuration.
pub struct PlanResolver<'c> {
    config: &'c Config,
}

impl<'c> From<&'c Config> for PlanResolver<'c> {
    fn from(config: &'c Config) -> Self { Self { config } }
}

impl PlanResolver<'_> {
    pub fn resolve(&self, secrets: SecretRequirement) -> Result<Plan, Error> {
        let Self { config } = self;
        let identity = Identity::resolve(config.topology.project.clone());
        let key = config.topology.database.secret_key.as_str();
        let provider = EnvSecretProvider::new(config.secrets.env_prefix.clone());

        let credential = match (Credential::require(&provider, &identity, key), secrets) {
            (Ok(credential), _) => credential,
            (Err(_), SecretRequirement::RedactedOnly) => {
                tracing::info!("Secret '{key}' is not set, rendering with a placeholder");
                let placeholder = StaticSecretProvider::default().with(key, PLACEHOLDER_SECRET);
                Credential::require(&placeholder, &identity, key).context(error::PlannerSnafu)?
            }
            (Err(err), SecretRequirement::Required) => return Err(err).context(error::PlannerSnafu),
        };

        Plan::build(
            identity,
            &config.topology,
            EnvironmentPolicy::from(config.environment),
            credential,
        )
        .context(error::PlannerSnafu)
    }
}
