//! In-process store. Rows live in insertion order per table.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::anyhow;
use chron_core::Row;
use chron_core::changes::is_present;

use crate::error::StoreError;
use crate::store::{AuditStore, SelectQuery, TableSpec};

#[derive(Debug)]
struct Table {
    spec: TableSpec,
    rows: Vec<Row>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Table>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in `table`, zero if undefined.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .map(|tables| tables.get(table).map_or(0, |t| t.rows.len()))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Table>>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Other(anyhow!("memory store lock poisoned")))
    }
}

impl AuditStore for MemoryStore {
    async fn define_table(&self, spec: &TableSpec) -> Result<(), StoreError> {
        self.lock()?
            .entry(spec.name.clone())
            .or_insert_with(|| Table {
                spec: spec.clone(),
                rows: Vec::new(),
            });
        Ok(())
    }

    async fn write(&self, table: &str, row: &Row) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        let entry = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        let column = &entry.spec.partition_column;
        if !row.get(column).is_some_and(is_present) {
            return Err(StoreError::MissingPartitionKey {
                table: table.to_string(),
                column: column.clone(),
            });
        }
        entry.rows.push(row.clone());
        Ok(())
    }

    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Row>, StoreError> {
        let tables = self.lock()?;
        let entry = tables
            .get(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        query.check_partition(&entry.spec)?;

        let mut rows: Vec<Row> = entry
            .rows
            .iter()
            .filter(|row| query.conditions.iter().all(|c| c.matches(row)))
            .cloned()
            .collect();
        drop(tables);
        query.sort_rows(&mut rows);
        if let Some(limit) = query.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Condition;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[tokio::test]
    async fn write_requires_defined_table_and_partition_value() {
        let store = MemoryStore::new();
        let err = store.write("audits", &row(json!({"partition_key": 1}))).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownTable(_)));

        store.define_table(&TableSpec::new("audits", "partition_key")).await.unwrap();
        let err = store.write("audits", &row(json!({"action": "create"}))).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingPartitionKey { .. }));

        store.write("audits", &row(json!({"partition_key": 1}))).await.unwrap();
        assert_eq!(store.row_count("audits"), 1);
    }

    #[tokio::test]
    async fn select_filters_and_limits() {
        let store = MemoryStore::new();
        store.define_table(&TableSpec::new("audits", "partition_key")).await.unwrap();
        for n in 0..5 {
            store
                .write("audits", &row(json!({"partition_key": n % 2, "n": n})))
                .await
                .unwrap();
        }
        let query = SelectQuery {
            conditions: vec![Condition::equals("partition_key", 0)],
            limit: Some(2),
            ..SelectQuery::default()
        };
        let rows = store.select("audits", &query).await.unwrap();
        let ns: Vec<_> = rows.iter().map(|r| r["n"].clone()).collect();
        assert_eq!(ns, vec![json!(0), json!(2)]);
    }
}
