//! Name and namespace scope shared by every planned resource.

use std::collections::BTreeMap;

use berth_base::{PROJECT_NAME, consts::k8s::labels};
use k8s_openapi::{
    api::core::v1::Namespace,
    apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta},
};
use serde::{Deserialize, Serialize};

/// The `{name, namespace}` pair every resource is scoped by.
///
/// It is resolved once from the deployment unit's logical name and threaded
/// through every composer, so no component derives its own namespace.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Identity {
    name: String,
    namespace: String,
}

impl Identity {
    pub fn resolve(project_name: impl Into<String>) -> Self {
        let name = project_name.into();
        Self { namespace: name.clone(), name }
    }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    #[must_use]
    pub fn namespace(&self) -> &str { &self.namespace }

    /// Labels linking the workload to its service and disruption budget.
    #[must_use]
    pub fn selector_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(labels::NAME.to_string(), self.name.clone())])
    }

    #[must_use]
    pub fn selector(&self) -> LabelSelector {
        LabelSelector { match_labels: Some(self.selector_labels()), ..LabelSelector::default() }
    }

    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        let mut all = self.selector_labels();
        let _unused = all.insert(labels::MANAGED_BY.to_string(), PROJECT_NAME.to_string());
        all
    }

    /// Metadata for a namespaced object called `name` inside this scope.
    pub fn object_meta(&self, name: impl Into<String>) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.into()),
            namespace: Some(self.namespace.clone()),
            labels: Some(self.labels()),
            ..ObjectMeta::default()
        }
    }

    #[must_use]
    pub fn namespace_manifest(&self) -> Namespace {
        Namespace {
            metadata: ObjectMeta {
                name: Some(self.namespace.clone()),
                labels: Some(self.labels()),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        }
    }
}
