//! Lazy, chainable audit queries.
//!
//! Builder methods return a new query and never touch the receiver. Rows are
//! fetched on the first `to_a`/`first`/`last` and cached until `reset`.
//! Once loaded, builder methods are ignored.

use std::sync::Arc;

use chron_config::RouteConfig;
use chron_core::record::AuditRecord;
use serde_json::Value;

use crate::error::QueryError;
use crate::store::{AuditStore, Condition, Direction, SelectQuery};

pub struct AuditQuery<S> {
    store: Arc<S>,
    table: String,
    query: SelectQuery,
    records: Option<Vec<AuditRecord>>,
    first: Option<Option<AuditRecord>>,
}

impl<S> Clone for AuditQuery<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            table: self.table.clone(),
            query: self.query.clone(),
            records: self.records.clone(),
            first: self.first.clone(),
        }
    }
}

impl<S> std::fmt::Debug for AuditQuery<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditQuery")
            .field("table", &self.table)
            .field("query", &self.query)
            .field("loaded", &self.records.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: AuditStore> AuditQuery<S> {
    #[must_use]
    pub fn new(store: Arc<S>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
            query: SelectQuery::default(),
            records: None,
            first: None,
        }
    }

    /// A query pinned to one partition of a route's table.
    #[must_use]
    pub fn in_partition(store: Arc<S>, route: &RouteConfig, value: impl Into<Value>) -> Self {
        Self::new(store, route.table.clone()).where_eq(route.partition_column.clone(), value)
    }

    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.records.is_some()
    }

    #[must_use]
    pub const fn select_query(&self) -> &SelectQuery {
        &self.query
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    fn derive(&self, change: impl FnOnce(&mut SelectQuery)) -> Self {
        if self.is_loaded() {
            tracing::warn!(table = %self.table, "query already loaded, builder call ignored");
            return self.clone();
        }
        let mut next = self.clone();
        next.first = None;
        change(&mut next.query);
        next
    }

    #[must_use]
    pub fn where_eq(&self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let condition = Condition::equals(field, value);
        self.derive(|q| q.conditions.push(condition))
    }

    #[must_use]
    pub fn where_cond(&self, condition: Condition) -> Self {
        self.derive(|q| q.conditions.push(condition))
    }

    /// Append a sort field.
    #[must_use]
    pub fn order(&self, field: impl Into<String>, direction: Direction) -> Self {
        let field = field.into();
        self.derive(|q| q.order.push((field, direction)))
    }

    #[must_use]
    pub fn limit(&self, limit: u32) -> Self {
        self.derive(|q| q.limit = Some(limit))
    }

    #[must_use]
    pub fn allow_filtering(&self) -> Self {
        self.derive(|q| q.allow_filtering = true)
    }

    /// Every matching record, fetched once and cached.
    ///
    /// # Errors
    ///
    /// Returns `QueryError` if the select fails or a row does not decode.
    pub async fn to_a(&mut self) -> Result<&[AuditRecord], QueryError> {
        if self.records.is_none() {
            let records = self.fetch(&self.query).await?;
            self.records = Some(records);
        }
        Ok(self.records.as_deref().unwrap_or_default())
    }

    /// The first record. Fetches with `limit 1` unless already loaded.
    ///
    /// # Errors
    ///
    /// Returns `QueryError` if the select fails or a row does not decode.
    pub async fn first(&mut self) -> Result<Option<AuditRecord>, QueryError> {
        if let Some(records) = &self.records {
            return Ok(records.first().cloned());
        }
        if let Some(first) = &self.first {
            return Ok(first.clone());
        }
        let mut bounded = self.query.clone();
        bounded.limit = Some(1);
        let first = self.fetch(&bounded).await?.into_iter().next();
        self.first = Some(first.clone());
        Ok(first)
    }

    /// The last record within the explicit limit.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::LastWithoutLimitNotSupported`] when no limit is
    /// set and nothing is loaded, or `QueryError` if the select fails.
    pub async fn last(&mut self) -> Result<Option<AuditRecord>, QueryError> {
        if let Some(records) = &self.records {
            return Ok(records.last().cloned());
        }
        if self.query.limit.is_none() {
            return Err(QueryError::LastWithoutLimitNotSupported);
        }
        Ok(self.to_a().await?.last().cloned())
    }

    /// Drop cached results and fetch again.
    ///
    /// # Errors
    ///
    /// Returns `QueryError` if the select fails.
    pub async fn reload(&mut self) -> Result<&mut Self, QueryError> {
        self.reset();
        self.to_a().await?;
        Ok(self)
    }

    /// Drop cached results. The composed query is kept.
    pub fn reset(&mut self) -> &mut Self {
        self.records = None;
        self.first = None;
        self
    }

    async fn fetch(&self, query: &SelectQuery) -> Result<Vec<AuditRecord>, QueryError> {
        tracing::debug!(table = %self.table, query = %query, "audit query");
        let rows = self.store.select(&self.table, query).await?;
        let records = rows
            .into_iter()
            .map(AuditRecord::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::TableSpec;
    use chron_core::Row;
    use serde_json::json;

    async fn store_with(rows: &[Value]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .define_table(&TableSpec::new("audits", "partition_key"))
            .await
            .unwrap();
        for row in rows {
            if let Value::Object(map) = row {
                store.write("audits", map).await.unwrap();
            }
        }
        store
    }

    fn audit(partition: i64, id: i64, created_at: i64) -> Value {
        json!({
            "partition_key": partition,
            "auditable_type": "User",
            "auditable_id": id,
            "action": "update",
            "audited_changes": "{\"name\":[\"A\",\"B\"]}",
            "created_at": created_at,
        })
    }

    #[tokio::test]
    async fn builder_calls_do_not_mutate_receiver() {
        let store = store_with(&[]).await;
        let base = AuditQuery::new(store, "audits");
        let narrowed = base.where_eq("partition_key", 1).limit(5).order("created_at", Direction::Desc);
        assert!(base.select_query().conditions.is_empty());
        assert_eq!(base.select_query().limit, None);
        assert_eq!(narrowed.select_query().conditions.len(), 1);
        assert_eq!(narrowed.select_query().limit, Some(5));
    }

    #[tokio::test]
    async fn first_on_empty_partition_is_none() {
        let store = store_with(&[audit(1, 1, 10)]).await;
        let mut query = AuditQuery::new(store, "audits").where_eq("partition_key", 2).limit(1);
        assert_eq!(query.first().await.unwrap(), None);
    }

    #[tokio::test]
    async fn last_requires_limit() {
        let store = store_with(&[audit(1, 1, 10)]).await;
        let mut query = AuditQuery::new(store, "audits").where_eq("partition_key", 1);
        assert!(matches!(
            query.last().await,
            Err(QueryError::LastWithoutLimitNotSupported)
        ));
        assert!(!query.is_loaded());

        let mut bounded = query.limit(10);
        let last = bounded.last().await.unwrap().unwrap();
        assert_eq!(last.created_at, 10);
    }

    #[tokio::test]
    async fn results_are_cached_until_reset() {
        let store = store_with(&[audit(1, 1, 10)]).await;
        let mut query = AuditQuery::new(Arc::clone(&store), "audits").where_eq("partition_key", 1);
        assert_eq!(query.to_a().await.unwrap().len(), 1);

        let row: Row = match audit(1, 2, 20) {
            Value::Object(map) => map,
            _ => Row::new(),
        };
        store.write("audits", &row).await.unwrap();
        assert_eq!(query.to_a().await.unwrap().len(), 1);

        let ignored = query.limit(1);
        assert_eq!(ignored.select_query().limit, None);

        query.reset();
        assert!(!query.is_loaded());
        assert_eq!(query.to_a().await.unwrap().len(), 2);
        assert_eq!(query.reload().await.unwrap().to_a().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn decodes_changes() {
        let store = store_with(&[audit(1, 1, 10)]).await;
        let mut query = AuditQuery::new(store, "audits").where_eq("partition_key", 1);
        let record = query.first().await.unwrap().unwrap();
        assert_eq!(Value::Object(record.audited_changes), json!({"name": ["A", "B"]}));
    }
}
