//! Queue consumer.
//!
//! The in-memory entities of the original mutation are gone by the time a
//! message is consumed, so the worker reloads the entity by primary key and
//! re-runs owner resolution and fan-out against the current registry.

use std::sync::Arc;

use chron_capture::{Auditor, Capture, EntityProvider, OwnerKey, ResolvedOwner};
use chron_core::enums::AuditAction;
use chron_core::message::{MESSAGE_VERSION, QueueMessage};
use chron_db::{AuditWriter, PersistReport, Router, StoreProvider};

use crate::error::{QueueError, WorkerError};
use crate::queue::AuditQueue;

/// Totals of one [`Worker::drain`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub batches: usize,
    /// Messages persisted, possibly with per-row skips or failures.
    pub processed: usize,
    /// Messages dropped after a processing failure.
    pub failed: usize,
    /// Queue lines that could not be decoded.
    pub undecodable: usize,
    pub report: PersistReport,
}

#[derive(Debug)]
pub struct Worker<P, SP> {
    auditor: Auditor<P>,
    stores: Arc<SP>,
    router: Arc<Router>,
}

impl<P, SP> Worker<P, SP>
where
    P: EntityProvider,
    SP: StoreProvider,
{
    #[must_use]
    pub const fn new(auditor: Auditor<P>, stores: Arc<SP>, router: Arc<Router>) -> Self {
        Self {
            auditor,
            stores,
            router,
        }
    }

    /// Re-materialize and persist one message.
    ///
    /// A destroyed entity cannot be reloaded, so destroys are expanded with
    /// the owner ids captured at mutation time and carry no snapshots.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError` if the payload version is unknown, the type is
    /// not audited, the entity no longer exists or the keyspace cannot be
    /// opened. Row-level write failures are counted in the report instead.
    pub async fn perform(&self, message: &QueueMessage) -> Result<PersistReport, WorkerError> {
        if message.v != MESSAGE_VERSION {
            return Err(WorkerError::UnsupportedVersion(message.v));
        }
        let payload = &message.payload;
        let policy = self
            .auditor
            .registry()
            .policy(&payload.auditable_type)
            .ok_or_else(|| WorkerError::UnknownType(payload.auditable_type.clone()))?;

        let (owner, entity) = if payload.action == AuditAction::Destroy {
            let owner = payload.associated_type.as_ref().map(|owner_type| {
                ResolvedOwner::new(
                    owner_type.clone(),
                    OwnerKey::from_keys(payload.associated_ids.iter().cloned()),
                )
            });
            (owner, None)
        } else {
            let id = payload
                .auditable_id
                .clone()
                .ok_or_else(|| WorkerError::MissingId(payload.auditable_type.clone()))?;
            let entity = self
                .auditor
                .provider()
                .find(&payload.auditable_type, &id)?
                .ok_or_else(|| WorkerError::EntityMissing {
                    type_name: payload.auditable_type.clone(),
                    id,
                })?;
            (self.auditor.resolve(policy, &entity), Some(entity))
        };

        let capture = Capture {
            draft: payload.base_draft(),
            owner,
        };
        let drafts = self
            .auditor
            .finish(policy, capture, entity.as_ref(), &message.locale);

        let store = self.stores.for_bucket(&message.temporal_bucket).await?;
        let writer = AuditWriter::open(store, Arc::clone(&self.router)).await?;
        let mut report = writer.persist_all(&drafts, &payload.actor).await;
        for draft in &drafts {
            report.merge(writer.persist_actor_mirror(draft, &payload.actor).await);
        }
        Ok(report)
    }

    /// Consume `queue` until it is empty. Failed messages are logged and
    /// dropped; every batch is acknowledged once processed.
    ///
    /// # Errors
    ///
    /// Returns `QueueError` only if the queue itself cannot be read or
    /// acknowledged.
    pub async fn drain<Q: AuditQueue>(&self, queue: &Q) -> Result<WorkerSummary, QueueError> {
        let mut summary = WorkerSummary::default();
        while let Some(delivery) = queue.receive().await? {
            summary.batches += 1;
            summary.undecodable += delivery.dropped;
            for message in &delivery.messages {
                match self.perform(message).await {
                    Ok(report) => {
                        summary.processed += 1;
                        summary.report.merge(report);
                    }
                    Err(e) => {
                        tracing::error!(
                            queue = %queue.name(),
                            auditable_type = %message.payload.auditable_type,
                            auditable_id = ?message.payload.auditable_id,
                            action = %message.payload.action,
                            bucket = %message.temporal_bucket,
                            error = %e,
                            "audit worker failed, dropping message"
                        );
                        summary.failed += 1;
                    }
                }
            }
            queue.ack(&delivery).await?;
        }
        tracing::info!(
            queue = %queue.name(),
            batches = summary.batches,
            processed = summary.processed,
            failed = summary.failed,
            undecodable = summary.undecodable,
            written = summary.report.written,
            "queue drained"
        );
        Ok(summary)
    }
}
