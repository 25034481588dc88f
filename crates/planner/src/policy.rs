//! Environment-conditional policy: entry points, middleware chains, rate
//! limits, image caching, container sizing and probe timing.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::identity::Identity;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Cutover environment: plaintext entry point that redirects to https.
    #[default]
    Transitional,
    /// TLS-only entry point with stricter rate limits.
    Hardened,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let val = match self {
            Self::Transitional => "transitional",
            Self::Hardened => "hardened",
        };
        f.write_str(val)
    }
}

impl FromStr for Variant {
    type Err = ParseVariantError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "transitional" | "a" => Ok(Self::Transitional),
            "hardened" | "b" => Ok(Self::Hardened),
            _ => InvalidSnafu { value }.fail(),
        }
    }
}

#[derive(Debug, Snafu)]
pub enum ParseVariantError {
    #[snafu(display("'{value}' is not a valid environment, expected 'transitional' or 'hardened'"))]
    Invalid { value: String },
}

/// Named listener on the edge router.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    Web,
    WebSecure,
}

impl EntryPoint {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::WebSecure => "websecure",
        }
    }

    #[must_use]
    pub const fn accepts_plaintext(self) -> bool { matches!(self, Self::Web) }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RateLimitPolicy {
    pub average: u32,
    pub burst: u32,
}

/// How the rate-limit middleware is named. The two environments name it
/// differently and the difference is kept.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MiddlewareName {
    Fixed(String),
    Workload,
}

impl MiddlewareName {
    #[must_use]
    pub fn resolve(&self, identity: &Identity) -> String {
        match self {
            Self::Fixed(name) => name.clone(),
            Self::Workload => identity.name().to_string(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RedirectPolicy {
    pub scheme: String,
    pub permanent: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CachePolicy {
    /// Reuse previously pushed stage images as cache sources.
    CacheFrom { stages: Vec<String> },
    /// Embed cache metadata into the pushed image.
    InlineCache,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceSizing {
    pub cpu_request: String,
    pub memory_request: String,
    pub cpu_limit: String,
    pub memory_limit: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProbeTiming {
    pub readiness_initial_delay_seconds: Option<i32>,
    pub liveness_initial_delay_seconds: i32,
}

/// Every decision that differs between environments.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EnvironmentPolicy {
    pub variant: Variant,
    pub entry_points: Vec<EntryPoint>,
    pub tls: bool,
    pub redirect: Option<RedirectPolicy>,
    pub rate_limit: RateLimitPolicy,
    pub rate_limit_name: MiddlewareName,
    pub cache: CachePolicy,
    pub resources: Option<ResourceSizing>,
    pub pre_stop_delay_seconds: Option<u32>,
    pub probes: ProbeTiming,
}

impl EnvironmentPolicy {
    #[must_use]
    pub fn transitional() -> Self {
        Self {
            variant: Variant::Transitional,
            entry_points: vec![EntryPoint::Web],
            tls: false,
            redirect: Some(RedirectPolicy { scheme: "https".to_string(), permanent: true }),
            rate_limit: RateLimitPolicy { average: 500, burst: 100 },
            rate_limit_name: MiddlewareName::Fixed("ratelimit".to_string()),
            cache: CachePolicy::CacheFrom { stages: vec!["build".to_string()] },
            resources: None,
            pre_stop_delay_seconds: Some(5),
            probes: ProbeTiming {
                readiness_initial_delay_seconds: None,
                liveness_initial_delay_seconds: 30,
            },
        }
    }

    #[must_use]
    pub fn hardened() -> Self {
        Self {
            variant: Variant::Hardened,
            entry_points: vec![EntryPoint::WebSecure],
            tls: true,
            redirect: None,
            rate_limit: RateLimitPolicy { average: 300, burst: 100 },
            rate_limit_name: MiddlewareName::Workload,
            cache: CachePolicy::InlineCache,
            resources: Some(ResourceSizing {
                cpu_request: "100m".to_string(),
                memory_request: "128Mi".to_string(),
                cpu_limit: "500m".to_string(),
                memory_limit: "256Mi".to_string(),
            }),
            pre_stop_delay_seconds: None,
            probes: ProbeTiming {
                readiness_initial_delay_seconds: None,
                liveness_initial_delay_seconds: 30,
            },
        }
    }

    #[must_use]
    pub fn accepts_plaintext(&self) -> bool {
        self.entry_points.iter().any(|entry_point| entry_point.accepts_plaintext())
    }
}

impl From<Variant> for EnvironmentPolicy {
    fn from(variant: Variant) -> Self {
        match variant {
            Variant::Transitional => Self::transitional(),
            Variant::Hardened => Self::hardened(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variant() {
        assert_eq!("Hardened".parse::<Variant>().ok(), Some(Variant::Hardened));
        assert_eq!("transitional".parse::<Variant>().ok(), Some(Variant::Transitional));
        assert!("staging".parse::<Variant>().is_err());
    }

    #[test]
    fn test_transitional_accepts_plaintext_and_redirects() {
        let policy = EnvironmentPolicy::from(Variant::Transitional);
        assert!(policy.accepts_plaintext());
        assert!(policy.redirect.is_some());
        assert_eq!(policy.rate_limit, RateLimitPolicy { average: 500, burst: 100 });
    }

    #[test]
    fn test_hardened_is_tls_only() {
        let policy = EnvironmentPolicy::from(Variant::Hardened);
        assert!(!policy.accepts_plaintext());
        assert!(policy.tls);
        assert!(policy.redirect.is_none());
        assert_eq!(policy.rate_limit, RateLimitPolicy { average: 300, burst: 100 });
    }

    #[test]
    fn test_rate_limit_names_differ() {
        let identity = Identity::resolve("chat");
        assert_eq!(EnvironmentPolicy::transitional().rate_limit_name.resolve(&identity), "ratelimit");
        assert_eq!(EnvironmentPolicy::hardened().rate_limit_name.resolve(&identity), "chat");
    }
}
