//! Conversions between JSON rows and libSQL values.

use serde_json::Value;

use crate::error::StoreError;

/// Bind a JSON scalar as a libSQL parameter, matching what `json_extract`
/// returns for the same value.
#[must_use]
pub fn to_sql_value(value: &Value) -> libsql::Value {
    match value {
        Value::Null => libsql::Value::Null,
        Value::Bool(b) => libsql::Value::Integer(i64::from(*b)),
        Value::Number(n) => n.as_i64().map_or_else(
            || libsql::Value::Real(n.as_f64().unwrap_or_default()),
            libsql::Value::Integer,
        ),
        Value::String(s) => libsql::Value::Text(s.clone()),
        other => libsql::Value::Text(other.to_string()),
    }
}

/// Text form of a partition value, used for the partition index.
#[must_use]
pub fn partition_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Only plain identifiers may be spliced into a JSON path.
///
/// # Errors
///
/// Returns [`StoreError::Query`] for names with characters outside
/// `[A-Za-z0-9_]`.
pub fn json_path(field: &str) -> Result<String, StoreError> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StoreError::Query(format!("Invalid field name '{field}'")));
    }
    Ok(format!("$.{field}"))
}

/// Parse a stored row body.
///
/// # Errors
///
/// Returns [`StoreError::Query`] if the body is not a JSON object.
pub fn parse_body(body: &str) -> Result<chron_core::Row, StoreError> {
    match serde_json::from_str(body) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(_) => Err(StoreError::Query("Row body is not an object".into())),
        Err(e) => Err(StoreError::Query(format!("Invalid JSON in row body: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!(3), libsql::Value::Integer(3))]
    #[case(json!(true), libsql::Value::Integer(1))]
    #[case(json!("x"), libsql::Value::Text("x".into()))]
    #[case(json!(null), libsql::Value::Null)]
    fn binds_scalars(#[case] input: Value, #[case] expected: libsql::Value) {
        assert_eq!(to_sql_value(&input), expected);
    }

    #[test]
    fn json_path_rejects_injection() {
        assert_eq!(json_path("associated_id").unwrap(), "$.associated_id");
        assert!(json_path("a') OR 1=1 --").is_err());
        assert!(json_path("").is_err());
    }

    #[test]
    fn body_must_be_object() {
        assert!(parse_body(r#"{"a":1}"#).is_ok());
        assert!(parse_body("[1]").is_err());
        assert!(parse_body("nope").is_err());
    }
}
