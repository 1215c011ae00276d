//! Keyspace migration runner.
//!
//! Embeds the SQL migration files at compile time and executes them on
//! open. All statements use `IF NOT EXISTS` for idempotent re-running.

use crate::error::StoreError;
use crate::local::LocalStore;

const MIGRATION_001: &str = include_str!("../migrations/001_audit_rows.sql");

impl LocalStore {
    /// Run all embedded migrations in sequence.
    pub(crate) async fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn()
            .execute_batch(MIGRATION_001)
            .await
            .map_err(|e| StoreError::Migration(format!("001_audit_rows: {e}")))?;
        Ok(())
    }
}
