use berth_planner::{NodeId, Plan};
use comfy_table::{Cell, ContentArrangement};

/// Renders the apply order of a plan.
pub trait PlanExt {
    fn render_table(&self) -> String;
}

impl PlanExt for Plan {
    fn render_table(&self) -> String {
        let rows = self
            .layers()
            .iter()
            .enumerate()
            .flat_map(|(index, layer)| layer.iter().map(move |id| (index + 1, id)))
            .map(|(layer, id)| {
                let dependencies = self
                    .graph()
                    .dependencies_of(id)
                    .map(NodeId::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                [
                    Cell::new(layer),
                    Cell::new(id.kind),
                    Cell::new(&id.name),
                    Cell::new(self.identity().namespace()),
                    Cell::new(dependencies),
                ]
            })
            .collect::<Vec<_>>();

        comfy_table::Table::new()
            .load_preset(comfy_table::presets::NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["LAYER", "KIND", "NAME", "NAMESPACE", "DEPENDS ON"])
            .add_rows(rows)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use berth_planner::{
        Credential, EnvironmentPolicy, Identity, StaticSecretProvider, Topology, Variant,
    };

    use super::*;

    #[test]
    fn test_table_lists_every_node() {
        let identity = Identity::resolve("chat");
        let provider = StaticSecretProvider::default().with("postgresPassword", "hunter2");
        let credential = Credential::require(&provider, &identity, "postgresPassword")
            .expect("secret is present");
        let plan = Plan::build(
            identity,
            &Topology::default(),
            EnvironmentPolicy::from(Variant::Hardened),
            credential,
        )
        .expect("default topology is valid");

        let table = plan.render_table();
        assert!(table.contains("DEPENDS ON"));
        assert!(table.contains("ingressroute"));
        assert!(table.contains("middleware/chat"));
        assert!(!table.contains("hunter2"));
    }
}
