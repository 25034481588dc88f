pub mod k8s {
    pub mod labels {
        pub const NAME: &str = "app.kubernetes.io/name";
        pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
    }

    /// Field manager used for server-side apply.
    pub const FIELD_MANAGER: &str = crate::PROJECT_NAME;

    /// Matches the default `progressDeadlineSeconds` of a Deployment.
    pub const DEFAULT_ROLLOUT_TIMEOUT_SECONDS: u64 = 600;
}

pub const DEFAULT_PROJECT: &str = "chat";
pub const DEFAULT_HOST: &str = "chat.aaronbatilo.dev";
pub const DEFAULT_SECRET_ENV_PREFIX: &str = "BERTH_SECRET_";
