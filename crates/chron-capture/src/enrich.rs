//! Value transforms and point-in-time snapshots.

use std::collections::HashMap;

use chron_core::draft::Draft;
use chron_core::keys::EntityKey;
use serde_json::Value;

use crate::entity::EntitySnapshot;
use crate::error::CaptureError;
use crate::graph::RelationshipGraph;
use crate::policy::{AuditPolicy, Transformer};
use crate::provider::EntityProvider;

impl Transformer {
    /// Replace each raw id in `values` with the requested fields of the
    /// related entity. Ids that do not resolve become null.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::UnknownRelation`] if `entity_type` has no
    /// relation with this transformer's name, or [`CaptureError::Host`] if
    /// the lookup fails.
    pub fn apply<P: EntityProvider + ?Sized>(
        &self,
        graph: &RelationshipGraph,
        provider: &P,
        entity_type: &str,
        values: Vec<Value>,
    ) -> Result<Vec<Value>, CaptureError> {
        let relation =
            graph
                .relation(entity_type, &self.relation)
                .ok_or_else(|| CaptureError::UnknownRelation {
                    type_name: entity_type.to_string(),
                    relation: self.relation.clone(),
                })?;

        let ids: Vec<EntityKey> = values.iter().filter_map(EntityKey::from_value).collect();
        let found = if ids.is_empty() {
            Vec::new()
        } else {
            provider.find_many(&relation.target_type, &ids)?
        };
        let mapping: HashMap<EntityKey, Value> = found
            .into_iter()
            .filter_map(|entity| {
                let id = entity.id.clone()?;
                Some((id, entity.project(&self.fields)))
            })
            .collect();

        Ok(values
            .iter()
            .map(|value| {
                EntityKey::from_value(value)
                    .and_then(|id| mapping.get(&id).cloned())
                    .unwrap_or(Value::Null)
            })
            .collect())
    }
}

/// Attach source and destination snapshots when the policy stores object
/// info and the host produces them. Missing snapshots stay omitted.
pub fn attach_snapshots<P: EntityProvider + ?Sized>(
    draft: &mut Draft,
    policy: &AuditPolicy,
    provider: &P,
    entity: &EntitySnapshot,
    locale: &str,
) {
    if !policy.store_objects_info {
        return;
    }
    if let Some(source) = provider.source_data(entity, locale) {
        draft.audit_source_data = Some(source);
    }
    if let Some(destination) = provider.destination_data(entity, locale) {
        draft.audit_destination_data = Some(destination);
    }
}
