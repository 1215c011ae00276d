//! Actors and the stamp they leave on persisted rows.
//!
//! The actor context does not survive into a queue worker, so the stamp is
//! captured once at mutation time and travels with the draft.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Row;
use crate::keys::EntityKey;

/// Whoever performed a mutation, with optional structured metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Actor {
    pub id: EntityKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Actor {
    #[must_use]
    pub fn new(id: impl Into<EntityKey>) -> Self {
        Self {
            id: id.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Denormalized actor columns written onto every audit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActorStamp {
    /// Acting user id, `0` when nobody is signed in.
    pub user_id: EntityKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superior_id: Option<EntityKey>,
    /// JSON text of the superior actor's metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superior_data: Option<String>,
    #[serde(default)]
    pub remote_address: String,
}

impl ActorStamp {
    /// Stamp used when no actor context is available.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            user_id: EntityKey::Int(0),
            superior_id: None,
            superior_data: None,
            remote_address: String::new(),
        }
    }

    #[must_use]
    pub fn capture(
        actor: Option<&Actor>,
        superior: Option<&Actor>,
        remote_address: Option<&str>,
    ) -> Self {
        Self {
            user_id: actor.map_or(EntityKey::Int(0), |a| a.id.clone()),
            superior_id: superior.map(|s| s.id.clone()),
            superior_data: superior
                .and_then(|s| s.data.as_ref())
                .map(ToString::to_string),
            remote_address: remote_address.unwrap_or_default().to_string(),
        }
    }

    /// Fill the actor columns of `row` without overwriting existing values.
    pub fn apply(&self, row: &mut Row) {
        row.entry("user_id").or_insert_with(|| self.user_id.to_value());
        if let Some(ref superior_id) = self.superior_id {
            row.entry("superior_id")
                .or_insert_with(|| superior_id.to_value());
        }
        if let Some(ref superior_data) = self.superior_data {
            row.entry("superior_data")
                .or_insert_with(|| Value::String(superior_data.clone()));
        }
        row.entry("remote_address")
            .or_insert_with(|| Value::String(self.remote_address.clone()));
    }
}

impl Default for ActorStamp {
    fn default() -> Self {
        Self::anonymous()
    }
}
