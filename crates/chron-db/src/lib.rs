//! # chron-db
//!
//! Partitioned, append-only storage for audit records.
//!
//! Provides the `AuditStore` seam with a libSQL keyspace per temporal bucket
//! and an in-memory variant, partition routing and the best-effort
//! `AuditWriter`, and the lazy `AuditQuery` read builder.
//!
//! Uses the `libsql` crate (v0.9.29) with rows stored as JSON bodies and
//! filtered through `json_extract`.

pub mod error;
pub mod helpers;
pub mod local;
pub mod memory;
mod migrations;
pub mod provider;
pub mod query;
pub mod routing;
pub mod store;
pub mod writer;

pub use error::{QueryError, StoreError};
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use provider::{LocalStoreProvider, MemoryStoreProvider, StoreProvider};
pub use query::AuditQuery;
pub use routing::Router;
pub use store::{AuditStore, CmpOp, Condition, Direction, SelectQuery, TableSpec};
pub use writer::{AuditWriter, PersistReport};
