//! Disruption budget for voluntary evictions.

use k8s_openapi::{
    api::policy::v1::{PodDisruptionBudget, PodDisruptionBudgetSpec},
    apimachinery::pkg::util::intstr::IntOrString,
};

use crate::{identity::Identity, workload::WorkloadSpec};

/// At most one replica may be voluntarily unavailable, whatever the replica
/// count.
pub const BUDGET_MAX_UNAVAILABLE: i32 = 1;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DisruptionBudget {
    identity: Identity,
    max_unavailable: i32,
}

impl DisruptionBudget {
    #[must_use]
    pub fn guard(identity: &Identity, workload: &WorkloadSpec) -> Self {
        tracing::debug!(
            "Guarding {} replica(s) of {} with a budget of {BUDGET_MAX_UNAVAILABLE}",
            workload.replicas(),
            workload.name()
        );
        Self { identity: identity.clone(), max_unavailable: BUDGET_MAX_UNAVAILABLE }
    }

    #[must_use]
    pub fn name(&self) -> &str { self.identity.name() }

    #[must_use]
    pub fn namespace(&self) -> &str { self.identity.namespace() }

    #[must_use]
    pub const fn max_unavailable(&self) -> i32 { self.max_unavailable }

    #[must_use]
    pub fn to_manifest(&self) -> PodDisruptionBudget {
        PodDisruptionBudget {
            metadata: self.identity.object_meta(self.identity.name()),
            spec: Some(PodDisruptionBudgetSpec {
                max_unavailable: Some(IntOrString::Int(self.max_unavailable)),
                selector: Some(self.identity.selector()),
                ..PodDisruptionBudgetSpec::default()
            }),
            ..PodDisruptionBudget::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        credential::{Credential, StaticSecretProvider},
        database::DatabaseRelease,
        policy::EnvironmentPolicy,
        topology::Topology,
    };

    #[test]
    fn test_budget_allows_single_eviction() {
        let identity = Identity::resolve("chat");
        let topology = Topology { replicas: 5, ..Topology::default() };
        let provider = StaticSecretProvider::default().with("postgresPassword", "hunter2");
        let credential = Credential::require(&provider, &identity, "postgresPassword")
            .expect("secret is present");
        let database = DatabaseRelease::provision(&identity, &topology.database, &credential);
        let workload = WorkloadSpec::compose(
            &identity,
            &topology,
            &EnvironmentPolicy::hardened(),
            &database,
            &credential,
        );

        let budget = DisruptionBudget::guard(&identity, &workload);
        assert_eq!(budget.max_unavailable(), 1);

        let spec = budget.to_manifest().spec.expect("budget spec");
        assert_eq!(spec.max_unavailable, Some(IntOrString::Int(1)));
        assert!(spec.min_available.is_none());
        assert_eq!(spec.selector, Some(workload.selector()));
    }
}
