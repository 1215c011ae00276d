//! Persisting drafts.
//!
//! Writes are best-effort: every failure is logged with the offending row
//! and counted, never returned. A draft becomes one row per partition value
//! of its route.

use std::sync::Arc;

use chron_config::RouteConfig;
use chron_core::Row;
use chron_core::actor::ActorStamp;
use chron_core::bucket::{epoch_millis, year_month};
use chron_core::draft::Draft;
use chrono::Utc;
use serde_json::Value;

use crate::error::StoreError;
use crate::routing::{Router, partition_values};
use crate::store::AuditStore;

/// Outcome counts of persisting one or more drafts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistReport {
    /// Rows the store accepted.
    pub written: usize,
    /// Drafts with no partition value for their route.
    pub skipped: usize,
    /// Rows the store rejected, or drafts that could not be encoded.
    pub failed: usize,
}

impl PersistReport {
    pub const fn merge(&mut self, other: Self) {
        self.written += other.written;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.skipped == 0 && self.failed == 0
    }
}

/// Writes drafts into their routed tables.
#[derive(Debug)]
pub struct AuditWriter<S> {
    store: Arc<S>,
    router: Arc<Router>,
}

impl<S> Clone for AuditWriter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            router: Arc::clone(&self.router),
        }
    }
}

impl<S: AuditStore> AuditWriter<S> {
    /// Define every routed table in `store` and return a writer over it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if a table cannot be defined.
    pub async fn open(store: Arc<S>, router: Arc<Router>) -> Result<Self, StoreError> {
        for spec in router.tables() {
            store.define_table(&spec).await?;
        }
        Ok(Self { store, router })
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Persist one draft, stamped with `stamp`, into its routed table.
    pub async fn persist(&self, draft: &Draft, stamp: &ActorStamp) -> PersistReport {
        let route = self.router.route_for(draft.associated_type.as_deref());
        self.persist_to(route, draft, stamp).await
    }

    /// Persist every draft independently.
    pub async fn persist_all(&self, drafts: &[Draft], stamp: &ActorStamp) -> PersistReport {
        let mut report = PersistReport::default();
        for draft in drafts {
            report.merge(self.persist(draft, stamp).await);
        }
        report
    }

    /// Copy a draft into the actor route, if one is configured.
    pub async fn persist_actor_mirror(&self, draft: &Draft, stamp: &ActorStamp) -> PersistReport {
        match self.router.actor_route() {
            Some(route) => self.persist_to(route, draft, stamp).await,
            None => PersistReport::default(),
        }
    }

    /// Persist a caller-built draft for `auditable_type`, outside any
    /// mutation.
    pub async fn write_explicit(
        &self,
        auditable_type: &str,
        mut draft: Draft,
        stamp: &ActorStamp,
    ) -> PersistReport {
        auditable_type.clone_into(&mut draft.auditable_type);
        self.persist(&draft, stamp).await
    }

    async fn persist_to(&self, route: &RouteConfig, draft: &Draft, stamp: &ActorStamp) -> PersistReport {
        let mut report = PersistReport::default();
        let now = Utc::now();
        let mut row = match draft.to_row(epoch_millis(now), year_month(now)) {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(
                    auditable_type = %draft.auditable_type,
                    error = %e,
                    "audit draft could not be encoded"
                );
                report.failed += 1;
                return report;
            }
        };
        stamp.apply(&mut row);

        let values = partition_values(route, &row);
        if values.is_empty() {
            tracing::warn!(
                table = %route.table,
                column = %route.partition_column,
                auditable_type = %draft.auditable_type,
                "partition key missing, audit row skipped"
            );
            report.skipped += 1;
            return report;
        }

        for value in values {
            let mut partitioned: Row = row.clone();
            partitioned.insert(route.partition_column.clone(), value);
            match self.store.write(&route.table, &partitioned).await {
                Ok(()) => report.written += 1,
                Err(e) => {
                    let rejected = Value::Object(partitioned);
                    tracing::warn!(
                        table = %route.table,
                        error = %e,
                        row = %rejected,
                        "audit write failed"
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }
}
