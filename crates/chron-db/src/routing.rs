//! Partition routing: which table a record lands in and under which
//! partition value(s).

use std::collections::BTreeMap;

use chron_config::{ChronConfig, PartitionSource, RouteConfig};
use chron_core::Row;
use chron_core::changes::is_present;
use serde_json::Value;

use crate::store::TableSpec;

/// Routes keyed by `associated_type`, plus the default and actor routes.
#[derive(Debug, Clone)]
pub struct Router {
    default: RouteConfig,
    routes: BTreeMap<String, RouteConfig>,
    actor: Option<RouteConfig>,
}

impl Router {
    #[must_use]
    pub fn new(default: RouteConfig) -> Self {
        Self {
            default,
            routes: BTreeMap::new(),
            actor: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &ChronConfig) -> Self {
        Self {
            default: config.store.default_route(),
            routes: config.routes.clone(),
            actor: config.audit.actor_route.clone(),
        }
    }

    /// Route records owned by `associated_type` to `route`.
    #[must_use]
    pub fn with_route(mut self, associated_type: impl Into<String>, route: RouteConfig) -> Self {
        self.routes.insert(associated_type.into(), route);
        self
    }

    /// Mirror worker-produced records into `route`, keyed by actor.
    #[must_use]
    pub fn with_actor_route(mut self, route: RouteConfig) -> Self {
        self.actor = Some(route);
        self
    }

    /// The route for a record, by its `associated_type`.
    #[must_use]
    pub fn route_for(&self, associated_type: Option<&str>) -> &RouteConfig {
        associated_type
            .and_then(|t| self.routes.get(t))
            .unwrap_or(&self.default)
    }

    #[must_use]
    pub const fn actor_route(&self) -> Option<&RouteConfig> {
        self.actor.as_ref()
    }

    /// Every table any route writes to, each once.
    #[must_use]
    pub fn tables(&self) -> Vec<TableSpec> {
        let mut tables: Vec<TableSpec> = Vec::new();
        let all = std::iter::once(&self.default)
            .chain(self.routes.values())
            .chain(self.actor.iter());
        for route in all {
            let spec = TableSpec::new(route.table.clone(), route.partition_column.clone());
            if !tables.iter().any(|t| t.name == spec.name) {
                tables.push(spec);
            }
        }
        tables
    }
}

/// Row field a partition source reads.
#[must_use]
pub const fn source_field(source: PartitionSource) -> &'static str {
    match source {
        PartitionSource::AssociatedId => "associated_id",
        PartitionSource::ActorId => "user_id",
        PartitionSource::YearMonth => "year_month",
        PartitionSource::AuditableId => "auditable_id",
    }
}

/// Partition values for `row` under `route`.
///
/// A value already present in the partition column wins over the route's
/// source field. Arrays are flattened, absent values dropped and duplicates
/// removed; one row is written per remaining value.
#[must_use]
pub fn partition_values(route: &RouteConfig, row: &Row) -> Vec<Value> {
    let raw = row
        .get(&route.partition_column)
        .filter(|v| is_present(v))
        .or_else(|| row.get(source_field(route.source)));

    let mut values: Vec<Value> = Vec::new();
    let mut push = |value: &Value| {
        if is_present(value) && !values.contains(value) {
            values.push(value.clone());
        }
    };
    match raw {
        Some(Value::Array(items)) => items.iter().for_each(&mut push),
        Some(value) => push(value),
        None => {}
    }
    values
}
