//! Helpers shared by the planning subcommands.

mod plan;

pub use self::plan::{PlanResolver, SecretRequirement};
