//! The partitioned store seam.
//!
//! Stores are schemaless: a table is a name plus the column its rows are
//! partitioned by, and a row is a JSON object. Selects are a conjunction of
//! field conditions with optional ordering and limit.

use std::cmp::Ordering;
use std::fmt;

use chron_core::Row;
use serde_json::Value;

use crate::error::StoreError;

/// A table and the column its rows are partitioned by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableSpec {
    pub name: String,
    pub partition_column: String,
}

impl TableSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, partition_column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partition_column: partition_column.into(),
        }
    }
}

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl CmpOp {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::In => "IN",
        }
    }
}

/// One field predicate. For [`CmpOp::In`] the value is an array.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: CmpOp,
    pub value: Value,
}

impl Condition {
    #[must_use]
    pub fn new(field: impl Into<String>, op: CmpOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, CmpOp::Eq, value)
    }

    /// Whether the condition pins a single partition (or a fixed set of them).
    fn pins(&self, column: &str) -> bool {
        self.field == column && matches!(self.op, CmpOp::Eq | CmpOp::In)
    }

    /// Evaluate against an in-memory row. Missing fields never match.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        let Some(actual) = row.get(&self.field) else {
            return false;
        };
        match self.op {
            CmpOp::Eq => compare_values(actual, &self.value) == Some(Ordering::Equal),
            CmpOp::Gt => compare_values(actual, &self.value) == Some(Ordering::Greater),
            CmpOp::Gte => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            CmpOp::Lt => compare_values(actual, &self.value) == Some(Ordering::Less),
            CmpOp::Lte => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            CmpOp::In => match self.value {
                Value::Array(ref options) => options
                    .iter()
                    .any(|option| compare_values(actual, option) == Some(Ordering::Equal)),
                ref single => compare_values(actual, single) == Some(Ordering::Equal),
            },
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.op.as_sql(), self.value)
    }
}

/// Order of one sort field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A composed select.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectQuery {
    pub conditions: Vec<Condition>,
    pub order: Vec<(String, Direction)>,
    pub limit: Option<u32>,
    pub allow_filtering: bool,
}

impl SelectQuery {
    /// Reject selects that would scan every partition, unless filtering is
    /// allowed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::FilteringRequired`] when no condition pins
    /// `spec.partition_column` and `allow_filtering` is off.
    pub fn check_partition(&self, spec: &TableSpec) -> Result<(), StoreError> {
        if self.allow_filtering
            || self
                .conditions
                .iter()
                .any(|c| c.pins(&spec.partition_column))
        {
            return Ok(());
        }
        Err(StoreError::FilteringRequired {
            table: spec.name.clone(),
            partition_column: spec.partition_column.clone(),
        })
    }

    /// Sort rows in place by the configured order, keeping insertion order
    /// for ties.
    pub fn sort_rows(&self, rows: &mut [Row]) {
        if self.order.is_empty() {
            return;
        }
        rows.sort_by(|a, b| {
            for (field, direction) in &self.order {
                let ord = compare_values(
                    a.get(field).unwrap_or(&Value::Null),
                    b.get(field).unwrap_or(&Value::Null),
                )
                .unwrap_or(Ordering::Equal);
                let ord = match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.conditions.is_empty() {
            let selection: Vec<String> = self.conditions.iter().map(ToString::to_string).collect();
            parts.push(format!("WHERE {}", selection.join(" AND ")));
        }
        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|(field, dir)| format!("{field} {}", dir.as_sql()))
                .collect();
            parts.push(format!("ORDER BY {}", order.join(", ")));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("LIMIT {limit}"));
        }
        if self.allow_filtering {
            parts.push("ALLOW FILTERING".to_string());
        }
        f.write_str(&parts.join(" "))
    }
}

/// Compare two JSON scalars. Numbers compare numerically, strings and bools
/// by value, null sorts first. Mismatched kinds are incomparable.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less),
        (_, Value::Null) => Some(Ordering::Greater),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (x, y) if x == y => Some(Ordering::Equal),
        _ => None,
    }
}

/// A partitioned, append-only audit store.
pub trait AuditStore: Send + Sync {
    /// Declare a table. Defining an existing table again is a no-op.
    fn define_table(&self, spec: &TableSpec) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Append `row` to `table`.
    fn write(&self, table: &str, row: &Row) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Rows of `table` matching `query`, in insertion order unless ordered.
    fn select(
        &self,
        table: &str,
        query: &SelectQuery,
    ) -> impl Future<Output = Result<Vec<Row>, StoreError>> + Send;
}
