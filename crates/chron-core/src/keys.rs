//! Entity keys.
//!
//! Primary keys and foreign keys in the host data layer are either integers
//! or strings. `EntityKey` keeps both shapes and serializes untagged, so a
//! stored row carries `42` or `"usr-7"` exactly as the host produced it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum EntityKey {
    Int(i64),
    Text(String),
}

impl EntityKey {
    /// Interpret a JSON value as a key.
    ///
    /// Returns `None` for null, blank strings, and anything that is not an
    /// integer or a string. A blank key means "no key".
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) if !s.trim().is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(i) => Value::from(*i),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for EntityKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_values_are_not_keys() {
        assert_eq!(EntityKey::from_value(&Value::Null), None);
        assert_eq!(EntityKey::from_value(&json!("  ")), None);
        assert_eq!(EntityKey::from_value(&json!(1.5)), None);
        assert_eq!(EntityKey::from_value(&json!([1])), None);
    }

    #[test]
    fn keys_keep_their_shape() {
        assert_eq!(EntityKey::from_value(&json!(42)), Some(EntityKey::Int(42)));
        assert_eq!(
            EntityKey::from_value(&json!("usr-7")),
            Some(EntityKey::Text("usr-7".into()))
        );
        assert_eq!(serde_json::to_value(EntityKey::Int(3)).unwrap(), json!(3));
        assert_eq!(EntityKey::from("a").to_value(), json!("a"));
    }
}
