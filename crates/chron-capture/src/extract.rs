//! Change extraction: the filtered diff of one mutation.

use chron_core::changes::{AuditedChanges, is_present};
use chron_core::enums::AuditAction;
use serde_json::Value;

use crate::entity::Mutation;
use crate::error::CaptureError;
use crate::graph::RelationshipGraph;
use crate::policy::AuditPolicy;
use crate::provider::EntityProvider;

/// Build `audited_changes` for `mutation` under `policy`.
///
/// `create` and `destroy` take every present, audited attribute of the
/// entity (for `destroy`, its state just before removal). `update` takes
/// each audited change whose old and new values are both present, stored as
/// `[old, new]`. Transformed values that end up absent are dropped.
///
/// # Errors
///
/// Returns an error if a configured transformer cannot be applied.
pub fn extract_changes<P: EntityProvider + ?Sized>(
    policy: &AuditPolicy,
    graph: &RelationshipGraph,
    provider: &P,
    mutation: &Mutation,
) -> Result<AuditedChanges, CaptureError> {
    let type_name = &mutation.entity.type_name;
    let mut changes = AuditedChanges::new();

    match mutation.action {
        AuditAction::Create | AuditAction::Destroy => {
            for (attr, value) in &mutation.entity.attributes {
                if !policy.is_audited_column(attr) || !is_present(value) {
                    continue;
                }
                let transformed = transform(policy, graph, provider, type_name, attr, vec![value.clone()])?
                    .into_iter()
                    .next()
                    .unwrap_or(Value::Null);
                if is_present(&transformed) {
                    changes.insert(attr.clone(), transformed);
                }
            }
        }
        AuditAction::Update => {
            for change in &mutation.changes {
                if !policy.is_audited_column(&change.name) {
                    continue;
                }
                if !(is_present(&change.old) && is_present(&change.new)) {
                    continue;
                }
                let pair = transform(
                    policy,
                    graph,
                    provider,
                    type_name,
                    &change.name,
                    vec![change.old.clone(), change.new.clone()],
                )?;
                let diff = Value::Array(pair);
                if is_present(&diff) {
                    changes.insert(change.name.clone(), diff);
                }
            }
        }
    }
    Ok(changes)
}

fn transform<P: EntityProvider + ?Sized>(
    policy: &AuditPolicy,
    graph: &RelationshipGraph,
    provider: &P,
    type_name: &str,
    attr: &str,
    values: Vec<Value>,
) -> Result<Vec<Value>, CaptureError> {
    match policy.transformers.get(attr) {
        Some(transformer) => transformer.apply(graph, provider, type_name, values),
        None => Ok(values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{AttributeChange, EntitySnapshot};
    use crate::graph::Relation;
    use crate::memory::InMemoryEntities;
    use crate::policy::{AuditOptions, AuditRegistry, CaptureDefaults, Transformer};
    use chron_core::keys::EntityKey;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn registry() -> AuditRegistry {
        let graph = RelationshipGraph::new()
            .with_relation("Task", Relation::belongs_to("owner", "User", "owner_id"));
        let mut registry = AuditRegistry::new(graph, CaptureDefaults::default());
        registry
            .audited(
                "Task",
                AuditOptions::new()
                    .except(&["secret"])
                    .transform("owner_id", Transformer::new("owner", &["name"])),
            )
            .unwrap();
        registry
    }

    fn task() -> EntitySnapshot {
        EntitySnapshot::new("Task", Some(EntityKey::Int(9)))
            .with_attr("id", 9)
            .with_attr("title", "Ship it")
            .with_attr("notes", "")
            .with_attr("done", false)
            .with_attr("secret", "hunter2")
            .with_attr("created_at", "2026-01-01T00:00:00Z")
            .with_attr("owner_id", 1)
    }

    fn provider() -> InMemoryEntities {
        let entities = InMemoryEntities::new();
        entities.upsert(EntitySnapshot::new("User", Some(EntityKey::Int(1))).with_attr("name", "Ada"));
        entities.upsert(EntitySnapshot::new("User", Some(EntityKey::Int(2))).with_attr("name", "Grace"));
        entities
    }

    #[test]
    fn create_keeps_present_audited_attributes() {
        let registry = registry();
        let changes = extract_changes(
            registry.policy("Task").unwrap(),
            registry.graph(),
            &provider(),
            &Mutation::create(task()),
        )
        .unwrap();
        assert_eq!(
            serde_json::Value::Object(changes),
            json!({"title": "Ship it", "done": false, "owner_id": {"name": "Ada"}})
        );
    }

    #[test]
    fn update_requires_both_sides_present() {
        let registry = registry();
        let mutation = Mutation::update(
            task(),
            vec![
                AttributeChange::new("title", "Draft", "Ship it"),
                AttributeChange::new("notes", Value::Null, "later"),
                AttributeChange::new("secret", "a", "b"),
                AttributeChange::new("updated_at", "x", "y"),
                AttributeChange::new("owner_id", 1, 2),
            ],
        );
        let changes =
            extract_changes(registry.policy("Task").unwrap(), registry.graph(), &provider(), &mutation).unwrap();
        assert_eq!(
            serde_json::Value::Object(changes),
            json!({
                "title": ["Draft", "Ship it"],
                "owner_id": [{"name": "Ada"}, {"name": "Grace"}],
            })
        );
    }

    #[test]
    fn destroy_snapshots_state_before_removal() {
        let registry = registry();
        let changes = extract_changes(
            registry.policy("Task").unwrap(),
            registry.graph(),
            &provider(),
            &Mutation::destroy(task(), true),
        )
        .unwrap();
        assert!(changes.contains_key("title"));
        assert!(!changes.contains_key("id"));
        assert!(!changes.contains_key("created_at"));
    }
}
