//! In-process `EntityProvider` backed by a map of snapshots.
//!
//! Relations are followed by key convention: `belongs_to` reads the foreign
//! key on the source, `has_one`/`has_many` scan targets whose foreign key
//! equals the source id. Used by tests and by hosts that already hold their
//! state in memory.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use anyhow::anyhow;
use chron_core::keys::EntityKey;
use serde_json::Value;

use crate::entity::EntitySnapshot;
use crate::graph::{Relation, RelationKind};
use crate::provider::EntityProvider;

#[derive(Debug, Default)]
pub struct InMemoryEntities {
    entities: RwLock<BTreeMap<(String, EntityKey), EntitySnapshot>>,
    source_fields: HashMap<String, Vec<String>>,
    destination_fields: HashMap<String, Vec<String>>,
    destination_lookups: HashMap<String, (String, Vec<String>)>,
}

impl InMemoryEntities {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `type_name` a source snapshot made of `fields`.
    #[must_use]
    pub fn with_source_fields(mut self, type_name: &str, fields: &[&str]) -> Self {
        self.source_fields
            .insert(type_name.to_string(), fields.iter().map(ToString::to_string).collect());
        self
    }

    /// Give `type_name` a destination snapshot made of `fields`.
    #[must_use]
    pub fn with_destination_fields(mut self, type_name: &str, fields: &[&str]) -> Self {
        self.destination_fields
            .insert(type_name.to_string(), fields.iter().map(ToString::to_string).collect());
        self
    }

    /// Field-partition replicas of `auditable_type` describe the `owner_type`
    /// entity they were filed under, using `fields`.
    #[must_use]
    pub fn with_destination_lookup(
        mut self,
        auditable_type: &str,
        owner_type: &str,
        fields: &[&str],
    ) -> Self {
        self.destination_lookups.insert(
            auditable_type.to_string(),
            (
                owner_type.to_string(),
                fields.iter().map(ToString::to_string).collect(),
            ),
        );
        self
    }

    /// Insert or replace an entity. Entities without an id are ignored.
    pub fn upsert(&self, entity: EntitySnapshot) {
        let Some(id) = entity.id.clone() else {
            return;
        };
        if let Ok(mut entities) = self.entities.write() {
            entities.insert((entity.type_name.clone(), id), entity);
        }
    }

    pub fn remove(&self, type_name: &str, id: &EntityKey) -> Option<EntitySnapshot> {
        self.entities
            .write()
            .ok()?
            .remove(&(type_name.to_string(), id.clone()))
    }

    fn lookup(&self, type_name: &str, id: &EntityKey) -> anyhow::Result<Option<EntitySnapshot>> {
        let entities = self
            .entities
            .read()
            .map_err(|_| anyhow!("entity map lock poisoned"))?;
        Ok(entities.get(&(type_name.to_string(), id.clone())).cloned())
    }

    fn scan(&self, type_name: &str, foreign_key: &str, id: &EntityKey) -> anyhow::Result<Vec<EntitySnapshot>> {
        let entities = self
            .entities
            .read()
            .map_err(|_| anyhow!("entity map lock poisoned"))?;
        Ok(entities
            .values()
            .filter(|e| e.type_name == type_name)
            .filter(|e| {
                e.attr(foreign_key)
                    .and_then(EntityKey::from_value)
                    .is_some_and(|k| &k == id)
            })
            .cloned()
            .collect())
    }
}

impl EntityProvider for InMemoryEntities {
    fn find(&self, type_name: &str, id: &EntityKey) -> anyhow::Result<Option<EntitySnapshot>> {
        self.lookup(type_name, id)
    }

    fn find_many(&self, type_name: &str, ids: &[EntityKey]) -> anyhow::Result<Vec<EntitySnapshot>> {
        let mut found = Vec::new();
        for id in ids {
            if let Some(entity) = self.lookup(type_name, id)? {
                found.push(entity);
            }
        }
        Ok(found)
    }

    fn follow(
        &self,
        entity: &EntitySnapshot,
        relation: &Relation,
    ) -> anyhow::Result<Vec<EntitySnapshot>> {
        if relation.is_through() {
            return Err(anyhow!(
                "through relation '{}' must be followed hop by hop",
                relation.name
            ));
        }
        match relation.kind {
            RelationKind::BelongsTo => {
                let Some(key) = entity
                    .attr(&relation.foreign_key)
                    .and_then(EntityKey::from_value)
                else {
                    return Ok(Vec::new());
                };
                Ok(self
                    .lookup(&relation.target_type, &key)?
                    .into_iter()
                    .collect())
            }
            RelationKind::HasOne | RelationKind::HasMany => {
                let Some(ref id) = entity.id else {
                    return Ok(Vec::new());
                };
                let mut found = self.scan(&relation.target_type, &relation.foreign_key, id)?;
                if relation.kind == RelationKind::HasOne {
                    found.truncate(1);
                }
                Ok(found)
            }
        }
    }

    fn source_data(&self, entity: &EntitySnapshot, _locale: &str) -> Option<Value> {
        self.source_fields
            .get(&entity.type_name)
            .map(|fields| entity.project(fields))
    }

    fn destination_data(&self, entity: &EntitySnapshot, _locale: &str) -> Option<Value> {
        self.destination_fields
            .get(&entity.type_name)
            .map(|fields| entity.project(fields))
    }

    fn destination_data_for(
        &self,
        auditable_type: &str,
        associated_id: Option<&EntityKey>,
        _locale: &str,
    ) -> Option<Value> {
        let (owner_type, fields) = self.destination_lookups.get(auditable_type)?;
        let owner = self.lookup(owner_type, associated_id?).ok()??;
        Some(owner.project(fields))
    }
}
