//! Partition routes.
//!
//! A route says which table a record lands in and which value keys its
//! partition. Routes are looked up by the record's `associated_type`.

use serde::{Deserialize, Serialize};

/// Where a route's partition value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionSource {
    /// The record's owner id.
    #[default]
    AssociatedId,
    /// The acting user's id.
    ActorId,
    /// The `YYYYMM` bucket of `created_at`.
    YearMonth,
    /// The mutated entity's own id.
    AuditableId,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteConfig {
    pub table: String,
    pub partition_column: String,
    #[serde(default)]
    pub source: PartitionSource,
}

impl RouteConfig {
    #[must_use]
    pub fn new(
        table: impl Into<String>,
        partition_column: impl Into<String>,
        source: PartitionSource,
    ) -> Self {
        Self {
            table: table.into(),
            partition_column: partition_column.into(),
            source,
        }
    }
}
