//! Dependency orderer: decides the sequence tables are transferred in.
//!
//! Every referenced table must be fully written before any table holding
//! foreign keys into it. Two strategies are available:
//!
//! - [`plan_static`]: entity tables first, then link tables, each group in
//!   discovery order. Dependencies come from the descriptors' declared
//!   references.
//! - [`plan_dynamic`]: dependencies are read from the destination's
//!   foreign-key metadata and tables are layered topologically.
//!
//! Both produce a [`TransferPlan`] that is checked by [`validate_plan`]
//! before any row moves. The orderer never touches row data.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::config::TransferOrder;
use crate::core::schema::{TableDescriptor, TableRole};
use crate::core::traits::TargetWriter;
use crate::error::{MigrateError, Result};

/// One table in a plan together with the migrated tables it depends on.
#[derive(Debug, Clone)]
pub struct PlannedTable {
    /// Descriptor of the table.
    pub descriptor: TableDescriptor,
    /// Destination names of migrated tables that must come first.
    pub depends_on: Vec<String>,
}

/// Dependency-respecting table order for one run.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    strategy: TransferOrder,
    tables: Vec<PlannedTable>,
}

/// Serializable summary of a plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub strategy: TransferOrder,
    pub tables: Vec<String>,
}

impl TransferPlan {
    /// Strategy that built this plan.
    pub fn strategy(&self) -> TransferOrder {
        self.strategy
    }

    /// Planned tables in transfer order.
    pub fn tables(&self) -> &[PlannedTable] {
        &self.tables
    }

    /// Destination table names in transfer order.
    pub fn table_names(&self) -> Vec<String> {
        self.tables
            .iter()
            .map(|t| t.descriptor.destination_name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            strategy: self.strategy,
            tables: self.table_names(),
        }
    }
}

/// Keep only references to tables in the migrated set, minus self-references.
fn migrated_dependencies(
    table: &str,
    references: impl IntoIterator<Item = String>,
    migrated: &HashSet<String>,
) -> Vec<String> {
    let mut deps: Vec<String> = Vec::new();
    for r in references {
        if r != table && migrated.contains(&r) && !deps.contains(&r) {
            deps.push(r);
        }
    }
    deps
}

fn destination_set(descriptors: &[TableDescriptor]) -> HashSet<String> {
    descriptors
        .iter()
        .map(|d| d.destination_name().to_string())
        .collect()
}

/// Entity tables first, then link tables, each in the given order.
pub fn plan_static(descriptors: Vec<TableDescriptor>) -> TransferPlan {
    let migrated = destination_set(&descriptors);
    let (entities, links): (Vec<_>, Vec<_>) = descriptors
        .into_iter()
        .partition(|d| d.role() == TableRole::Entity);

    let tables = entities
        .into_iter()
        .chain(links)
        .map(|descriptor| PlannedTable {
            depends_on: migrated_dependencies(
                descriptor.destination_name(),
                descriptor.references().iter().cloned(),
                &migrated,
            ),
            descriptor,
        })
        .collect();

    TransferPlan {
        strategy: TransferOrder::Static,
        tables,
    }
}

/// Order tables by the destination's foreign-key constraints.
pub async fn plan_dynamic(
    descriptors: Vec<TableDescriptor>,
    target: &dyn TargetWriter,
) -> Result<TransferPlan> {
    let mut references = HashMap::new();
    for desc in &descriptors {
        let found = target.referenced_tables(desc.destination_name()).await?;
        debug!("{} references {:?}", desc.destination_name(), found);
        references.insert(desc.destination_name().to_string(), found);
    }
    plan_layered(descriptors, &references)
}

/// Topologically layer tables using the given reference lists.
///
/// Each round schedules, in input order, every remaining table whose
/// dependencies are all scheduled. A round that schedules nothing means the
/// remaining tables form a cycle.
pub fn plan_layered(
    descriptors: Vec<TableDescriptor>,
    references: &HashMap<String, Vec<String>>,
) -> Result<TransferPlan> {
    let migrated = destination_set(&descriptors);

    let mut remaining: Vec<PlannedTable> = descriptors
        .into_iter()
        .map(|descriptor| {
            let refs = references
                .get(descriptor.destination_name())
                .cloned()
                .unwrap_or_default();
            PlannedTable {
                depends_on: migrated_dependencies(descriptor.destination_name(), refs, &migrated),
                descriptor,
            }
        })
        .collect();

    let mut scheduled: HashSet<String> = HashSet::new();
    let mut tables = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<_>, Vec<_>) = remaining
            .into_iter()
            .partition(|t| t.depends_on.iter().all(|d| scheduled.contains(d)));

        if ready.is_empty() {
            let names: Vec<&str> = blocked
                .iter()
                .map(|t| t.descriptor.destination_name())
                .collect();
            return Err(MigrateError::Config(format!(
                "circular foreign-key dependency between tables: {}",
                names.join(", ")
            )));
        }

        for t in &ready {
            scheduled.insert(t.descriptor.destination_name().to_string());
        }
        tables.extend(ready);
        remaining = blocked;
    }

    Ok(TransferPlan {
        strategy: TransferOrder::Dynamic,
        tables,
    })
}

/// Fail if any table is placed before a migrated table it depends on.
pub fn validate_plan(plan: &TransferPlan) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    for table in &plan.tables {
        let name = table.descriptor.destination_name();
        if let Some(missing) = table.depends_on.iter().find(|d| !seen.contains(d.as_str())) {
            return Err(MigrateError::Config(format!(
                "{} transfer order places {} before {}, which it references",
                plan.strategy, name, missing
            )));
        }
        seen.insert(name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TableCatalog;

    fn entity(name: &str) -> TableDescriptor {
        TableDescriptor::builder(name)
            .column("id", "id")
            .unique_key(&["id"])
            .build()
            .unwrap()
    }

    fn link(name: &str, refs: &[&str]) -> TableDescriptor {
        let mut b = TableDescriptor::builder(name)
            .column("id", "id")
            .unique_key(&["id"])
            .link();
        for r in refs {
            b = b.references(*r);
        }
        b.build().unwrap()
    }

    fn movies_in_discovery_order() -> Vec<TableDescriptor> {
        let catalog = TableCatalog::movies().unwrap();
        ["film_work", "genre", "genre_film_work", "person", "person_film_work"]
            .iter()
            .map(|n| catalog.get(n).unwrap().clone())
            .collect()
    }

    #[test]
    fn test_static_puts_entities_first() {
        let plan = plan_static(movies_in_discovery_order());
        assert_eq!(
            plan.table_names(),
            vec!["film_work", "genre", "person", "genre_film_work", "person_film_work"]
        );
        assert!(validate_plan(&plan).is_ok());
        assert_eq!(plan.strategy(), TransferOrder::Static);
    }

    #[test]
    fn test_static_ignores_references_outside_migrated_set() {
        let plan = plan_static(vec![link("genre_film_work", &["film_work", "genre"]), entity("genre")]);
        assert_eq!(plan.table_names(), vec!["genre", "genre_film_work"]);
        assert_eq!(plan.tables()[1].depends_on, vec!["genre"]);
        assert!(validate_plan(&plan).is_ok());
    }

    #[test]
    fn test_static_plan_rejected_when_link_depends_on_link() {
        let plan = plan_static(vec![
            entity("a"),
            link("c", &["b"]),
            link("b", &["a"]),
        ]);
        assert!(matches!(validate_plan(&plan), Err(MigrateError::Config(_))));
    }

    #[test]
    fn test_layered_orders_chains() {
        let mut refs = HashMap::new();
        refs.insert("c".to_string(), vec!["b".to_string()]);
        refs.insert("b".to_string(), vec!["a".to_string(), "b".to_string(), "external".to_string()]);

        let plan = plan_layered(vec![entity("c"), entity("b"), entity("a")], &refs).unwrap();
        assert_eq!(plan.table_names(), vec!["a", "b", "c"]);
        assert_eq!(plan.tables()[1].depends_on, vec!["a"]);
        assert!(validate_plan(&plan).is_ok());
    }

    #[test]
    fn test_layered_keeps_input_order_within_layer() {
        let plan = plan_layered(vec![entity("z"), entity("a")], &HashMap::new()).unwrap();
        assert_eq!(plan.table_names(), vec!["z", "a"]);
    }

    #[test]
    fn test_layered_cycle_is_config_error() {
        let mut refs = HashMap::new();
        refs.insert("a".to_string(), vec!["b".to_string()]);
        refs.insert("b".to_string(), vec!["a".to_string()]);
        let err = plan_layered(vec![entity("a"), entity("b"), entity("c")], &refs).unwrap_err();
        match err {
            MigrateError::Config(msg) => {
                assert!(msg.contains("circular"));
                assert!(msg.ends_with("a, b"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_summary_lists_tables() {
        let plan = plan_static(vec![entity("genre")]);
        let summary = plan.summary();
        assert_eq!(summary.tables, vec!["genre"]);
        assert_eq!(serde_json::to_value(&summary).unwrap()["strategy"], "static");
    }
}
