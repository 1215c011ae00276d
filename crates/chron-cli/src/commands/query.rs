use std::sync::Arc;

use anyhow::Context;
use chron_config::ChronConfig;
use chron_core::bucket::TemporalBucket;
use chron_db::{AuditQuery, AuditStore, LocalStoreProvider, Router, StoreProvider, TableSpec};

use crate::cli::{GlobalFlags, QueryArgs};
use crate::commands::shared::parse::{parse_condition, parse_order, parse_value};
use crate::output::output;

/// Handle `chron query`.
pub async fn run(args: &QueryArgs, config: &ChronConfig, flags: &GlobalFlags) -> anyhow::Result<()> {
    let router = Router::from_config(config);
    let table = args
        .table
        .clone()
        .unwrap_or_else(|| config.store.default_table.clone());
    let tables = router.tables();
    let spec = tables
        .iter()
        .find(|spec| spec.name == table)
        .with_context(|| format!("table '{table}' is not configured"))?;

    let bucket = args
        .bucket
        .as_deref()
        .or_else(|| config.general.bucket())
        .map_or_else(TemporalBucket::current, TemporalBucket::new);
    let stores = LocalStoreProvider::new(config.store.clone());
    let store = stores
        .for_bucket(&bucket)
        .await
        .with_context(|| format!("failed to open keyspace for bucket {bucket}"))?;
    for spec in &tables {
        store.define_table(spec).await?;
    }

    let limit = flags.limit.unwrap_or(config.general.default_limit);
    let mut query = build_query(args, spec, store, limit)?;
    tracing::debug!(query = ?query, bucket = %bucket, "running audit query");

    if args.first {
        output(&query.first().await?, flags.format)
    } else if args.last {
        output(&query.last().await?, flags.format)
    } else {
        output(&query.to_a().await?, flags.format)
    }
}

/// Compose the query described by `args` against `spec`.
pub fn build_query<S: AuditStore>(
    args: &QueryArgs,
    spec: &TableSpec,
    store: Arc<S>,
    limit: u32,
) -> anyhow::Result<AuditQuery<S>> {
    let mut query = AuditQuery::new(store, spec.name.clone());
    if let Some(ref partition) = args.partition {
        query = query.where_eq(spec.partition_column.clone(), parse_value(partition));
    }
    for raw in &args.conditions {
        query = query.where_cond(parse_condition(raw)?);
    }
    for raw in &args.order {
        let (field, direction) = parse_order(raw)?;
        query = query.order(field, direction);
    }
    query = query.limit(limit);
    if args.allow_filtering {
        query = query.allow_filtering();
    }
    Ok(query)
}
