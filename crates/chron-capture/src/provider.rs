//! The seam to the host entity layer.

use chron_core::keys::EntityKey;
use serde_json::Value;

use crate::entity::EntitySnapshot;
use crate::graph::Relation;

/// Read access to live entity state, supplied by the host application.
///
/// Snapshot methods are optional capabilities: returning `None` means the
/// entity does not produce that snapshot and the field is omitted.
pub trait EntityProvider: Send + Sync {
    /// Reload an entity by primary key.
    ///
    /// # Errors
    ///
    /// Returns an error if the host lookup itself fails. A missing entity is
    /// `Ok(None)`.
    fn find(&self, type_name: &str, id: &EntityKey) -> anyhow::Result<Option<EntitySnapshot>>;

    /// Batch lookup, used by attribute transformers.
    ///
    /// # Errors
    ///
    /// Returns an error if the host lookup fails.
    fn find_many(&self, type_name: &str, ids: &[EntityKey]) -> anyhow::Result<Vec<EntitySnapshot>>;

    /// Entities on the far side of `relation`. Zero or one element unless the
    /// relation is a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the host lookup fails.
    fn follow(&self, entity: &EntitySnapshot, relation: &Relation)
    -> anyhow::Result<Vec<EntitySnapshot>>;

    /// Point-in-time description of the mutated entity.
    fn source_data(&self, _entity: &EntitySnapshot, _locale: &str) -> Option<Value> {
        None
    }

    /// Point-in-time description of what the entity points at.
    fn destination_data(&self, _entity: &EntitySnapshot, _locale: &str) -> Option<Value> {
        None
    }

    /// Destination description for a field-partition replica of
    /// `auditable_type`, given the owner id it was filed under.
    fn destination_data_for(
        &self,
        _auditable_type: &str,
        _associated_id: Option<&EntityKey>,
        _locale: &str,
    ) -> Option<Value> {
        None
    }
}
