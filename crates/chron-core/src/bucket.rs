//! Temporal buckets and time helpers.
//!
//! A temporal bucket selects the active keyspace generation (one per year).
//! It is carried explicitly with every queued message and every store lookup
//! instead of switching a process-wide connection.

use chrono::{DateTime, Datelike, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Short annual bucket, e.g. `"26"` for 2026.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TemporalBucket(String);

impl TemporalBucket {
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self(bucket.into())
    }

    /// The bucket a timestamp falls into.
    #[must_use]
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(format!("{:02}", at.year().rem_euclid(100)))
    }

    #[must_use]
    pub fn current() -> Self {
        Self::from_datetime(Utc::now())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemporalBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `YYYYMM` partition value for a timestamp.
#[must_use]
pub fn year_month(at: DateTime<Utc>) -> i64 {
    i64::from(at.year()) * 100 + i64::from(at.month())
}

/// Epoch milliseconds for a timestamp.
#[must_use]
pub fn epoch_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}
