//! # chron-core
//!
//! Core types shared across all Chronicle crates:
//! - Audit actions and entity keys
//! - Drafts (in-memory candidate records) and the rows they persist as
//! - Decoded audit records as returned by the query builder
//! - Actor stamps captured at mutation time
//! - Temporal buckets and `year_month` partitions
//! - The durable queue message envelope
//! - Encoding of `audited_changes` payloads

pub mod actor;
pub mod bucket;
pub mod changes;
pub mod draft;
pub mod enums;
pub mod errors;
pub mod keys;
pub mod message;
pub mod record;

/// A schemaless store row: column name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;
