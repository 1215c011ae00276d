//! Drafts: in-memory, not-yet-persisted audit records.

use serde_json::Value;

use crate::Row;
use crate::changes::{AuditedChanges, encode_changes};
use crate::enums::AuditAction;
use crate::errors::CoreError;
use crate::keys::EntityKey;

/// A candidate audit record.
///
/// Well-known columns are typed fields. Anything else a caller wants on the
/// row goes into `extra`; well-known columns always win over `extra` keys of
/// the same name when the row is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub auditable_type: String,
    pub auditable_id: Option<EntityKey>,
    pub action: AuditAction,
    pub audited_changes: AuditedChanges,
    pub associated_type: Option<String>,
    pub associated_id: Option<EntityKey>,
    pub audit_source_data: Option<Value>,
    pub audit_destination_data: Option<Value>,
    pub comment: Option<String>,
    pub extra: Row,
}

impl Draft {
    #[must_use]
    pub fn new(
        auditable_type: impl Into<String>,
        auditable_id: Option<EntityKey>,
        action: AuditAction,
    ) -> Self {
        Self {
            auditable_type: auditable_type.into(),
            auditable_id,
            action,
            audited_changes: AuditedChanges::new(),
            associated_type: None,
            associated_id: None,
            audit_source_data: None,
            audit_destination_data: None,
            comment: None,
            extra: Row::new(),
        }
    }

    #[must_use]
    pub fn with_changes(mut self, changes: AuditedChanges) -> Self {
        self.audited_changes = changes;
        self
    }

    #[must_use]
    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    #[must_use]
    pub fn with_association(mut self, associated_type: impl Into<String>, id: EntityKey) -> Self {
        self.associated_type = Some(associated_type.into());
        self.associated_id = Some(id);
        self
    }

    /// Drop the owner columns.
    pub fn clear_association(&mut self) {
        self.associated_type = None;
        self.associated_id = None;
    }

    /// Build the row written to the store.
    ///
    /// `audited_changes` is encoded as escaped JSON text and omitted when
    /// empty. Snapshots are stored as JSON text. Absent optional fields are
    /// omitted, never written as null.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Encoding`] if a payload cannot be serialized.
    pub fn to_row(&self, created_at: i64, year_month: i64) -> Result<Row, CoreError> {
        let mut row = self.extra.clone();
        row.insert(
            "auditable_type".into(),
            Value::String(self.auditable_type.clone()),
        );
        if let Some(ref id) = self.auditable_id {
            row.insert("auditable_id".into(), id.to_value());
        }
        row.insert("action".into(), Value::String(self.action.to_string()));
        match encode_changes(&self.audited_changes)? {
            Some(text) => {
                row.insert("audited_changes".into(), Value::String(text));
            }
            None => {
                row.remove("audited_changes");
            }
        }
        if let Some(ref associated_type) = self.associated_type {
            row.insert(
                "associated_type".into(),
                Value::String(associated_type.clone()),
            );
        }
        if let Some(ref id) = self.associated_id {
            row.insert("associated_id".into(), id.to_value());
        }
        if let Some(ref data) = self.audit_source_data {
            row.insert(
                "audit_source_data".into(),
                Value::String(serde_json::to_string(data)?),
            );
        }
        if let Some(ref data) = self.audit_destination_data {
            row.insert(
                "audit_destination_data".into(),
                Value::String(serde_json::to_string(data)?),
            );
        }
        if let Some(ref comment) = self.comment {
            row.insert("comment".into(), Value::String(comment.clone()));
        }
        row.insert("created_at".into(), Value::from(created_at));
        row.insert("year_month".into(), Value::from(year_month));
        Ok(row)
    }
}
