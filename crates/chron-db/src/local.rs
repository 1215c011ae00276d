//! libSQL-backed keyspace.
//!
//! One database file per temporal bucket. Every logical table shares the
//! `audit_rows` table; rows are stored as JSON bodies and predicates run
//! through `json_extract`.

use chron_core::Row;
use chron_core::changes::is_present;
use chron_core::errors::CoreError;
use libsql::Builder;
use serde_json::Value;

use crate::error::StoreError;
use crate::helpers::{json_path, parse_body, partition_text, to_sql_value};
use crate::store::{AuditStore, CmpOp, SelectQuery, TableSpec};

/// A local libSQL keyspace.
pub struct LocalStore {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore").finish_non_exhaustive()
    }
}

impl LocalStore {
    /// Open a keyspace at `path`, or `":memory:"` for tests.
    ///
    /// Runs migrations automatically on open.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the database cannot be opened or migrations
    /// fail.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;
        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Access the underlying libSQL connection.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    async fn table_spec(&self, table: &str) -> Result<TableSpec, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT partition_column FROM audit_tables WHERE name = ?1",
                [table],
            )
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        Ok(TableSpec::new(table, row.get::<String>(0)?))
    }

    fn build_select(table: &str, query: &SelectQuery) -> Result<(String, Vec<libsql::Value>), StoreError> {
        let mut params: Vec<libsql::Value> = vec![libsql::Value::Text(table.to_string())];
        let mut clauses = vec!["table_name = ?1".to_string()];

        for condition in &query.conditions {
            let path = json_path(&condition.field)?;
            let column = format!("json_extract(body, '{path}')");
            match (condition.op, &condition.value) {
                (CmpOp::In, Value::Array(options)) => {
                    if options.is_empty() {
                        clauses.push("0".to_string());
                        continue;
                    }
                    let mut placeholders = Vec::with_capacity(options.len());
                    for option in options {
                        params.push(to_sql_value(option));
                        placeholders.push(format!("?{}", params.len()));
                    }
                    clauses.push(format!("{column} IN ({})", placeholders.join(", ")));
                }
                (CmpOp::Eq | CmpOp::In, Value::Null) => clauses.push(format!("{column} IS NULL")),
                (op, value) => {
                    let op = if op == CmpOp::In { "=" } else { op.as_sql() };
                    params.push(to_sql_value(value));
                    clauses.push(format!("{column} {op} ?{}", params.len()));
                }
            }
        }

        let mut order = Vec::with_capacity(query.order.len() + 1);
        for (field, direction) in &query.order {
            let path = json_path(field)?;
            order.push(format!("json_extract(body, '{path}') {}", direction.as_sql()));
        }
        order.push("seq ASC".to_string());

        let mut sql = format!(
            "SELECT body FROM audit_rows WHERE {} ORDER BY {}",
            clauses.join(" AND "),
            order.join(", ")
        );
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Ok((sql, params))
    }
}

impl AuditStore for LocalStore {
    async fn define_table(&self, spec: &TableSpec) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO audit_tables (name, partition_column) VALUES (?1, ?2)
                 ON CONFLICT(name) DO NOTHING",
                libsql::params![spec.name.as_str(), spec.partition_column.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn write(&self, table: &str, row: &Row) -> Result<(), StoreError> {
        let spec = self.table_spec(table).await?;
        let partition = row
            .get(&spec.partition_column)
            .filter(|value| is_present(value))
            .ok_or_else(|| StoreError::MissingPartitionKey {
                table: table.to_string(),
                column: spec.partition_column.clone(),
            })?;
        let body = serde_json::to_string(row).map_err(CoreError::from)?;

        self.conn
            .execute(
                "INSERT INTO audit_rows (table_name, partition_value, body) VALUES (?1, ?2, ?3)",
                libsql::params![table, partition_text(partition), body],
            )
            .await
            .map_err(|e| StoreError::WriteFailed {
                table: table.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Row>, StoreError> {
        let spec = self.table_spec(table).await?;
        query.check_partition(&spec)?;
        let (sql, params) = Self::build_select(table, query)?;

        let mut rows = self
            .conn
            .query(&sql, libsql::params_from_iter(params))
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(parse_body(&row.get::<String>(0)?)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Condition, Direction};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn store() -> LocalStore {
        let store = LocalStore::open(":memory:").await.unwrap();
        store
            .define_table(&TableSpec::new("audits", "partition_key"))
            .await
            .unwrap();
        store
    }

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let store = store().await;
        store.run_migrations().await.unwrap();
        store
            .define_table(&TableSpec::new("audits", "other"))
            .await
            .unwrap();
        assert_eq!(store.table_spec("audits").await.unwrap().partition_column, "partition_key");
    }

    #[tokio::test]
    async fn write_and_select_by_partition() {
        let store = store().await;
        for (partition, n) in [(3, 1), (4, 2), (3, 3)] {
            store
                .write(
                    "audits",
                    &row(json!({"partition_key": partition, "n": n, "action": "update"})),
                )
                .await
                .unwrap();
        }

        let query = SelectQuery {
            conditions: vec![Condition::equals("partition_key", 3)],
            order: vec![("n".into(), Direction::Desc)],
            ..SelectQuery::default()
        };
        let rows = store.select("audits", &query).await.unwrap();
        let ns: Vec<_> = rows.iter().map(|r| r["n"].clone()).collect();
        assert_eq!(ns, vec![json!(3), json!(1)]);
    }

    #[tokio::test]
    async fn unpinned_select_needs_filtering() {
        let store = store().await;
        store
            .write("audits", &row(json!({"partition_key": 1, "action": "create"})))
            .await
            .unwrap();

        let mut query = SelectQuery {
            conditions: vec![Condition::equals("action", "create")],
            ..SelectQuery::default()
        };
        assert!(matches!(
            store.select("audits", &query).await,
            Err(StoreError::FilteringRequired { .. })
        ));
        query.allow_filtering = true;
        assert_eq!(store.select("audits", &query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn in_condition_and_limit() {
        let store = store().await;
        for partition in [1, 2, 3, 2] {
            store
                .write("audits", &row(json!({"partition_key": partition})))
                .await
                .unwrap();
        }
        let query = SelectQuery {
            conditions: vec![Condition::new("partition_key", CmpOp::In, json!([2, 3]))],
            limit: Some(2),
            ..SelectQuery::default()
        };
        let rows = store.select("audits", &query).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["partition_key"], json!(2));
    }

    #[tokio::test]
    async fn unknown_table_and_missing_partition() {
        let store = store().await;
        assert!(matches!(
            store.write("nope", &row(json!({"partition_key": 1}))).await,
            Err(StoreError::UnknownTable(_))
        ));
        assert!(matches!(
            store.write("audits", &row(json!({"partition_key": ""}))).await,
            Err(StoreError::MissingPartitionKey { .. })
        ));
    }
}
