//! `audited_changes` payloads and their stored text encoding.
//!
//! Changes are kept as a JSON object in memory. When persisted they become a
//! JSON string with single quotes escaped as `&#39;`, because the downstream
//! column store quotes values with `'`. Ampersands are escaped as `&amp;`
//! first so decoding is exact even when a value already contains `&#39;`.

use serde_json::Value;

use crate::errors::CoreError;

/// Attribute name to diff payload.
///
/// For `update` the payload is `[old, new]`; for `create` and `destroy` it is
/// the (possibly transformed) attribute value.
pub type AuditedChanges = serde_json::Map<String, Value>;

const ESCAPED_QUOTE: &str = "&#39;";
const ESCAPED_AMP: &str = "&amp;";

/// Whether a value counts as present.
///
/// Null, blank strings, empty arrays, and empty objects are absent.
/// `false` and `0` are present.
#[must_use]
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Encode a changes map for storage. Empty maps encode to `None`.
///
/// # Errors
///
/// Returns [`CoreError::Encoding`] if the map cannot be serialized.
pub fn encode_changes(changes: &AuditedChanges) -> Result<Option<String>, CoreError> {
    if changes.is_empty() {
        return Ok(None);
    }
    let json = serde_json::to_string(changes)?;
    Ok(Some(escape(&json)))
}

/// Decode text written by [`encode_changes`]. Blank text decodes to `None`.
///
/// # Errors
///
/// Returns [`CoreError::Encoding`] if the unescaped text is not valid JSON.
pub fn decode_changes(text: &str) -> Result<Option<Value>, CoreError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&unescape(text))?))
}

/// Parse a plain JSON text column, such as a snapshot. Nothing is unescaped.
/// Blank text decodes to `None`.
///
/// # Errors
///
/// Returns [`CoreError::Encoding`] if the text is not valid JSON.
pub fn parse_json_field(text: &str) -> Result<Option<Value>, CoreError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(text)?))
}

fn escape(json: &str) -> String {
    json.replace('&', ESCAPED_AMP).replace('\'', ESCAPED_QUOTE)
}

fn unescape(text: &str) -> String {
    text.replace(ESCAPED_QUOTE, "'").replace(ESCAPED_AMP, "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn changes(value: Value) -> AuditedChanges {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_changes_encode_to_none() {
        assert_eq!(encode_changes(&AuditedChanges::new()).unwrap(), None);
    }

    #[test]
    fn single_quotes_are_escaped() {
        let encoded = encode_changes(&changes(json!({"name": ["O'Brien", "O'Neil"]})))
            .unwrap()
            .unwrap();
        assert!(!encoded.contains('\''));
        assert!(encoded.contains("O&#39;Brien"));
    }

    #[rstest]
    #[case(json!({"name": ["A", "B"]}))]
    #[case(json!({"note": "it's &#39; already"}))]
    #[case(json!({"tags": ["a&b", "'quoted'"], "n": 3}))]
    fn decode_reverses_encode(#[case] value: Value) {
        let encoded = encode_changes(&changes(value.clone())).unwrap().unwrap();
        assert_eq!(decode_changes(&encoded).unwrap(), Some(value));
    }

    #[test]
    fn blank_text_decodes_to_none() {
        assert_eq!(decode_changes("").unwrap(), None);
        assert_eq!(parse_json_field("   ").unwrap(), None);
    }

    #[test]
    fn plain_fields_keep_entity_text() {
        let text = r#"{"company":"AT&amp;T","note":"x &#39; y"}"#;
        assert_eq!(
            parse_json_field(text).unwrap(),
            Some(json!({"company": "AT&amp;T", "note": "x &#39; y"}))
        );
    }

    #[rstest]
    #[case(Value::Null, false)]
    #[case(json!(""), false)]
    #[case(json!(" "), false)]
    #[case(json!([]), false)]
    #[case(json!({}), false)]
    #[case(json!(false), true)]
    #[case(json!(0), true)]
    #[case(json!("x"), true)]
    fn presence(#[case] value: Value, #[case] expected: bool) {
        assert_eq!(is_present(&value), expected);
    }
}
