//! Storage and query error types for chron-db.

use chron_core::errors::CoreError;
use thiserror::Error;

/// Errors from the partitioned store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write reached the store and was rejected.
    #[error("Write to {table} failed: {reason}")]
    WriteFailed { table: String, reason: String },

    /// A select could not be built or executed.
    #[error("Query failed: {0}")]
    Query(String),

    /// The select does not pin the partition column and filtering was not
    /// allowed.
    #[error("Query on {table} must restrict {partition_column} by equality or allow filtering")]
    FilteringRequired {
        table: String,
        partition_column: String,
    },

    /// The table was never defined in this keyspace.
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// The row has no value for the table's partition column.
    #[error("Row for {table} has no {column} value")]
    MissingPartitionKey { table: String, column: String },

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors surfaced to callers of [`crate::query::AuditQuery`].
#[derive(Debug, Error)]
pub enum QueryError {
    /// `last` needs a bound on an unordered append-only store.
    #[error("last() requires an explicit limit")]
    LastWithoutLimitNotSupported,

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A stored row did not decode into an audit record.
    #[error("Invalid audit row: {0}")]
    Decode(#[from] CoreError),
}
