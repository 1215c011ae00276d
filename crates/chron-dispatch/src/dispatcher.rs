//! The mutation-side entry point.

use std::sync::Arc;

use chron_capture::{Auditor, Capture, EntityProvider, Mutation};
use chron_config::DispatchMode;
use chron_core::message::{AuditPayload, MESSAGE_VERSION, QueueMessage};
use chron_db::{AuditWriter, PersistReport, Router, StoreProvider};
use chrono::Utc;

use crate::context::AuditContext;
use crate::error::DispatchError;
use crate::queue::AuditQueue;

/// What happened to one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The mutation produces no audit record.
    Skipped,
    /// Written inline.
    Persisted(PersistReport),
    /// Handed to the queue for a worker.
    Enqueued,
    /// Capture, store or queue failed. Already logged.
    Failed,
}

/// Routes captured mutations to the store, inline or through the queue.
#[derive(Debug)]
pub struct Dispatcher<P, SP, Q> {
    auditor: Auditor<P>,
    stores: Arc<SP>,
    router: Arc<Router>,
    queue: Arc<Q>,
    mode: DispatchMode,
}

impl<P, SP, Q> Dispatcher<P, SP, Q>
where
    P: EntityProvider,
    SP: StoreProvider,
    Q: AuditQueue,
{
    #[must_use]
    pub const fn new(
        auditor: Auditor<P>,
        stores: Arc<SP>,
        router: Arc<Router>,
        queue: Arc<Q>,
        mode: DispatchMode,
    ) -> Self {
        Self {
            auditor,
            stores,
            router,
            queue,
            mode,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> DispatchMode {
        self.mode
    }

    #[must_use]
    pub const fn auditor(&self) -> &Auditor<P> {
        &self.auditor
    }

    /// Audit `mutation` under `ctx`. Never fails; errors are logged and
    /// reported as [`DispatchOutcome::Failed`].
    pub async fn record(&self, mutation: &Mutation, ctx: &AuditContext) -> DispatchOutcome {
        let result = match self.mode {
            DispatchMode::Sync => self.persist_now(mutation, ctx).await,
            DispatchMode::Async => self.enqueue(mutation, ctx).await,
        };
        result.unwrap_or_else(|e| {
            tracing::warn!(
                auditable_type = %mutation.entity.type_name,
                auditable_id = ?mutation.entity.id,
                action = %mutation.action,
                error = %e,
                "audit dispatch failed"
            );
            DispatchOutcome::Failed
        })
    }

    async fn persist_now(
        &self,
        mutation: &Mutation,
        ctx: &AuditContext,
    ) -> Result<DispatchOutcome, DispatchError> {
        let drafts = self.auditor.drafts_for(mutation, &ctx.locale)?;
        if drafts.is_empty() {
            return Ok(DispatchOutcome::Skipped);
        }
        let store = self.stores.for_bucket(&ctx.temporal_bucket).await?;
        let writer = AuditWriter::open(store, Arc::clone(&self.router)).await?;
        Ok(DispatchOutcome::Persisted(
            writer.persist_all(&drafts, &ctx.stamp()).await,
        ))
    }

    async fn enqueue(
        &self,
        mutation: &Mutation,
        ctx: &AuditContext,
    ) -> Result<DispatchOutcome, DispatchError> {
        let Some(capture) = self.auditor.capture(mutation)? else {
            return Ok(DispatchOutcome::Skipped);
        };
        let message = QueueMessage {
            v: MESSAGE_VERSION,
            queue: self.queue.name().to_string(),
            payload: payload_for(capture, ctx),
            temporal_bucket: ctx.temporal_bucket.clone(),
            locale: ctx.locale.clone(),
            enqueued_at: Utc::now(),
        };
        self.queue.enqueue(&message).await?;
        tracing::debug!(
            queue = %message.queue,
            auditable_type = %message.payload.auditable_type,
            bucket = %message.temporal_bucket,
            "audit enqueued"
        );
        Ok(DispatchOutcome::Enqueued)
    }
}

/// The base draft's raw attributes plus the actor stamp taken now.
fn payload_for(capture: Capture, ctx: &AuditContext) -> AuditPayload {
    let Capture { draft, owner } = capture;
    AuditPayload {
        auditable_type: draft.auditable_type,
        auditable_id: draft.auditable_id,
        action: draft.action,
        audited_changes: draft.audited_changes,
        associated_type: owner.as_ref().map(|o| o.owner_type.clone()),
        associated_ids: owner.as_ref().map(|o| o.keys()).unwrap_or_default(),
        comment: draft.comment,
        actor: ctx.stamp(),
        extra: draft.extra,
    }
}
