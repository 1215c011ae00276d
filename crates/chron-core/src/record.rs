//! Decoded audit records, as returned by the query builder.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Row;
use crate::changes::{AuditedChanges, decode_changes, parse_json_field};
use crate::enums::AuditAction;
use crate::errors::CoreError;
use crate::keys::EntityKey;

/// Row columns that hold JSON text and are decoded on read. Only
/// `audited_changes` is stored escaped.
pub const JSON_TEXT_COLUMNS: [&str; 4] = [
    "audited_changes",
    "audit_source_data",
    "audit_destination_data",
    "superior_data",
];

/// A persisted, immutable audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AuditRecord {
    pub auditable_type: String,
    #[serde(default)]
    pub auditable_id: Option<EntityKey>,
    pub action: AuditAction,
    #[serde(default)]
    pub audited_changes: AuditedChanges,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_id: Option<EntityKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_source_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_destination_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Epoch milliseconds, set by the writer.
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_month: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<EntityKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superior_id: Option<EntityKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superior_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<String>,
    /// Partition columns and any caller-supplied columns.
    #[serde(flatten)]
    pub extra: Row,
}

impl AuditRecord {
    /// Decode a store row, parsing the JSON text columns back into values.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Encoding`] if a JSON column or the row itself does
    /// not decode, and [`CoreError::Validation`] if `audited_changes` is not
    /// an object.
    pub fn from_row(mut row: Row) -> Result<Self, CoreError> {
        for column in JSON_TEXT_COLUMNS {
            let decoded = match row.remove(column) {
                Some(Value::String(text)) if column == "audited_changes" => decode_changes(&text)?,
                Some(Value::String(text)) => parse_json_field(&text)?,
                Some(Value::Null) | None => None,
                Some(other) => Some(other),
            };
            if let Some(value) = decoded {
                row.insert(column.to_string(), value);
            }
        }
        if row
            .get("audited_changes")
            .is_some_and(|changes| !changes.is_object())
        {
            return Err(CoreError::Validation(
                "audited_changes must decode to an object".into(),
            ));
        }
        Ok(serde_json::from_value(Value::Object(row))?)
    }

    /// `created_at` as a UTC timestamp.
    #[must_use]
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::Draft;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn decodes_what_a_draft_writes() {
        let changes = json!({"name": ["O'Hara", "B"]}).as_object().cloned().unwrap();
        let mut draft = Draft::new("User", Some(EntityKey::Int(42)), AuditAction::Update)
            .with_changes(changes.clone());
        draft.audit_destination_data = Some(json!({"title": "Ops"}));
        let mut row = draft.to_row(1_760_000_000_000, 202_510).unwrap();
        row.insert("partition_key".into(), json!(3));

        let record = AuditRecord::from_row(row).unwrap();
        assert_eq!(record.audited_changes, changes);
        assert_eq!(record.audit_destination_data, Some(json!({"title": "Ops"})));
        assert_eq!(record.audit_source_data, None);
        assert_eq!(record.action, AuditAction::Update);
        assert_eq!(record.year_month, Some(202_510));
        assert_eq!(record.extra.get("partition_key"), Some(&json!(3)));
    }

    #[test]
    fn snapshots_read_back_unchanged() {
        let source = json!({"company": "AT&amp;T", "note": "x &#39; y"});
        let superior = json!({"name": "O&#39;Hara & Co"});
        let mut draft = Draft::new("Company", Some(EntityKey::Int(5)), AuditAction::Update)
            .with_changes(json!({"name": ["AT&amp;T", "AT&T"]}).as_object().cloned().unwrap());
        draft.audit_source_data = Some(source.clone());
        draft.audit_destination_data = Some(source.clone());
        let mut row = draft.to_row(1_760_000_000_000, 202_510).unwrap();
        row.insert(
            "superior_data".into(),
            Value::String(serde_json::to_string(&superior).unwrap()),
        );

        let record = AuditRecord::from_row(row).unwrap();
        assert_eq!(record.audit_source_data, Some(source.clone()));
        assert_eq!(record.audit_destination_data, Some(source));
        assert_eq!(record.superior_data, Some(superior));
        assert_eq!(
            record.audited_changes.get("name"),
            Some(&json!(["AT&amp;T", "AT&T"]))
        );
    }

    #[test]
    fn blank_json_columns_decode_to_absent() {
        let row = json!({
            "auditable_type": "User",
            "auditable_id": 1,
            "action": "destroy",
            "audited_changes": "",
            "superior_data": "{\"name\":\"Root\"}",
            "created_at": 10
        });
        let record = AuditRecord::from_row(row.as_object().cloned().unwrap()).unwrap();
        assert!(record.audited_changes.is_empty());
        assert_eq!(record.superior_data, Some(json!({"name": "Root"})));
        assert!(record.created_at_utc().is_some());
    }

    #[test]
    fn non_object_changes_are_rejected() {
        let row = json!({
            "auditable_type": "User",
            "action": "update",
            "audited_changes": "[1,2]",
            "created_at": 10
        });
        let err = AuditRecord::from_row(row.as_object().cloned().unwrap()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
