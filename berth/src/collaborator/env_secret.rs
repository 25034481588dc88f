use berth_planner::{Error, SecretProvider, SecretValue};

/// Reads secrets from environment variables: key `postgresPassword` with
/// prefix `BERTH_SECRET_` is read from `BERTH_SECRET_POSTGRES_PASSWORD`.
#[derive(Clone, Debug)]
pub struct EnvSecretProvider {
    prefix: String,
}

impl EnvSecretProvider {
    pub fn new(prefix: impl Into<String>) -> Self { Self { prefix: prefix.into() } }

    pub fn variable_name(&self, key: &str) -> String {
        let mut name = self.prefix.clone();
        let mut previous_lowercase = false;
        for ch in key.chars() {
            if ch.is_ascii_uppercase() && previous_lowercase {
                name.push('_');
            }
            previous_lowercase = ch.is_ascii_lowercase() || ch.is_ascii_digit();
            name.push(if ch.is_ascii_alphanumeric() { ch.to_ascii_uppercase() } else { '_' });
        }
        name
    }
}

impl SecretProvider for EnvSecretProvider {
    fn require_secret(&self, key: &str) -> Result<SecretValue, Error> {
        let variable = self.variable_name(key);
        match std::env::var(&variable) {
            Ok(value) if !value.is_empty() => Ok(SecretValue::new(value)),
            _ => {
                tracing::warn!("Secret '{key}' is expected in environment variable {variable}");
                Err(Error::MissingSecret { key: key.to_string() })
            }
        }
    }
}
