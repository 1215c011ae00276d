use chron_db::{CmpOp, Condition, Direction};
use serde_json::Value;

/// Interpret a command-line value as JSON, falling back to a plain string.
#[must_use]
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Parse `field<op>value`. A JSON array compared with `=` becomes `IN`.
pub fn parse_condition(raw: &str) -> anyhow::Result<Condition> {
    let Some(at) = raw.find(['<', '>', '=']) else {
        anyhow::bail!("invalid condition '{raw}': expected field=value");
    };
    let (field, rest) = raw.split_at(at);
    let field = field.trim();
    if field.is_empty() {
        anyhow::bail!("invalid condition '{raw}': missing field name");
    }

    let (op, value) = if let Some(value) = rest.strip_prefix(">=") {
        (CmpOp::Gte, value)
    } else if let Some(value) = rest.strip_prefix("<=") {
        (CmpOp::Lte, value)
    } else if let Some(value) = rest.strip_prefix('>') {
        (CmpOp::Gt, value)
    } else if let Some(value) = rest.strip_prefix('<') {
        (CmpOp::Lt, value)
    } else {
        (CmpOp::Eq, &rest[1..])
    };

    let value = parse_value(value.trim());
    let op = if op == CmpOp::Eq && value.is_array() {
        CmpOp::In
    } else {
        op
    };
    Ok(Condition::new(field, op, value))
}

/// Parse `field` or `field:asc|desc`.
pub fn parse_order(raw: &str) -> anyhow::Result<(String, Direction)> {
    let (field, direction) = match raw.split_once(':') {
        None => (raw, Direction::Asc),
        Some((field, dir)) => match dir.to_ascii_lowercase().as_str() {
            "asc" => (field, Direction::Asc),
            "desc" => (field, Direction::Desc),
            _ => anyhow::bail!("invalid order '{raw}': direction must be asc or desc"),
        },
    };
    if field.trim().is_empty() {
        anyhow::bail!("invalid order '{raw}': missing field name");
    }
    Ok((field.trim().to_string(), direction))
}
