//! Host entity state as the capture pipeline sees it.

use chron_core::Row;
use chron_core::enums::AuditAction;
use chron_core::keys::EntityKey;
use serde_json::Value;

/// Attribute values of one entity at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySnapshot {
    pub type_name: String,
    pub id: Option<EntityKey>,
    pub attributes: Row,
}

impl EntitySnapshot {
    #[must_use]
    pub fn new(type_name: impl Into<String>, id: Option<EntityKey>) -> Self {
        Self {
            type_name: type_name.into(),
            id,
            attributes: Row::new(),
        }
    }

    /// A blank instance, standing in for an entity that no longer exists.
    #[must_use]
    pub fn empty(type_name: impl Into<String>) -> Self {
        Self::new(type_name, None)
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Object of the requested fields. `id` falls back to the primary key;
    /// other missing fields are null.
    #[must_use]
    pub fn project(&self, fields: &[String]) -> Value {
        let mut picked = Row::new();
        for field in fields {
            let value = match (field.as_str(), self.attr(field)) {
                (_, Some(v)) => v.clone(),
                ("id", None) => self.id.as_ref().map_or(Value::Null, EntityKey::to_value),
                (_, None) => Value::Null,
            };
            picked.insert(field.clone(), value);
        }
        Value::Object(picked)
    }
}

/// One attribute's before/after values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChange {
    pub name: String,
    pub old: Value,
    pub new: Value,
}

impl AttributeChange {
    #[must_use]
    pub fn new(name: impl Into<String>, old: impl Into<Value>, new: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            old: old.into(),
            new: new.into(),
        }
    }
}

/// A mutation event reported by the host after it happened.
///
/// For `destroy`, `entity` is the state immediately before removal and
/// `destroyed` reports whether the removal actually completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub action: AuditAction,
    pub entity: EntitySnapshot,
    pub changes: Vec<AttributeChange>,
    pub destroyed: bool,
    pub comment: Option<String>,
}

impl Mutation {
    #[must_use]
    pub const fn create(entity: EntitySnapshot) -> Self {
        Self {
            action: AuditAction::Create,
            entity,
            changes: Vec::new(),
            destroyed: false,
            comment: None,
        }
    }

    #[must_use]
    pub const fn update(entity: EntitySnapshot, changes: Vec<AttributeChange>) -> Self {
        Self {
            action: AuditAction::Update,
            entity,
            changes,
            destroyed: false,
            comment: None,
        }
    }

    #[must_use]
    pub const fn destroy(entity: EntitySnapshot, destroyed: bool) -> Self {
        Self {
            action: AuditAction::Destroy,
            entity,
            changes: Vec::new(),
            destroyed,
            comment: None,
        }
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}
