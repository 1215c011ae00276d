//! The capture pipeline: mutation in, drafts out.

use std::sync::Arc;

use chron_core::draft::Draft;
use chron_core::enums::AuditAction;

use crate::entity::{EntitySnapshot, Mutation};
use crate::enrich::attach_snapshots;
use crate::error::CaptureError;
use crate::expand::expand;
use crate::extract::extract_changes;
use crate::policy::{AuditPolicy, AuditRegistry};
use crate::provider::EntityProvider;
use crate::resolve::{ResolvedOwner, resolve_owner};

/// The base draft of one mutation plus the owner it resolved to, before
/// snapshots and fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub draft: Draft,
    pub owner: Option<ResolvedOwner>,
}

/// Runs extraction, resolution, enrichment and fan-out against a registry
/// and a host provider.
#[derive(Debug)]
pub struct Auditor<P> {
    registry: Arc<AuditRegistry>,
    provider: Arc<P>,
}

impl<P> Clone for Auditor<P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<P: EntityProvider> Auditor<P> {
    #[must_use]
    pub const fn new(registry: Arc<AuditRegistry>, provider: Arc<P>) -> Self {
        Self { registry, provider }
    }

    #[must_use]
    pub fn registry(&self) -> &AuditRegistry {
        &self.registry
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The policy for `type_name` if it is registered and currently enabled.
    #[must_use]
    pub fn active_policy(&self, type_name: &str) -> Option<&AuditPolicy> {
        self.registry
            .policy(type_name)
            .filter(|policy| policy.is_enabled())
    }

    /// Extract the diff and resolve the owner of `mutation`.
    ///
    /// Returns `Ok(None)` when the mutation produces no record: the type is
    /// not audited or paused, the action is not audited, a destroy did not
    /// complete, or an update changed nothing audited.
    ///
    /// # Errors
    ///
    /// Returns an error if a transformer cannot be applied.
    pub fn capture(&self, mutation: &Mutation) -> Result<Option<Capture>, CaptureError> {
        let entity = &mutation.entity;
        let Some(policy) = self.active_policy(&entity.type_name) else {
            return Ok(None);
        };
        if !policy.audits(mutation.action) {
            return Ok(None);
        }
        if mutation.action == AuditAction::Destroy && !mutation.destroyed {
            tracing::debug!(
                auditable_type = %entity.type_name,
                "destroy did not complete, skipping audit"
            );
            return Ok(None);
        }

        let changes = extract_changes(policy, self.registry.graph(), self.provider.as_ref(), mutation)?;
        if mutation.action == AuditAction::Update && changes.is_empty() {
            return Ok(None);
        }

        let draft = Draft::new(entity.type_name.clone(), entity.id.clone(), mutation.action)
            .with_changes(changes)
            .with_comment(mutation.comment.clone());
        let owner = self.resolve(policy, entity);
        Ok(Some(Capture { draft, owner }))
    }

    /// Resolve the configured owner of `entity`. Host failures are logged
    /// and treated as unassociated.
    #[must_use]
    pub fn resolve(&self, policy: &AuditPolicy, entity: &EntitySnapshot) -> Option<ResolvedOwner> {
        let owner_type = policy.associated_with.as_deref()?;
        match resolve_owner(self.registry.graph(), self.provider.as_ref(), entity, owner_type) {
            Ok(owner) => owner,
            Err(e) => {
                tracing::warn!(
                    auditable_type = %entity.type_name,
                    owner_type,
                    error = %e,
                    "owner resolution failed, recording as unassociated"
                );
                None
            }
        }
    }

    /// Attach snapshots of `snapshot_of` (when given) and fan the capture out.
    #[must_use]
    pub fn finish(
        &self,
        policy: &AuditPolicy,
        capture: Capture,
        snapshot_of: Option<&EntitySnapshot>,
        locale: &str,
    ) -> Vec<Draft> {
        let Capture { mut draft, owner } = capture;
        if let Some(entity) = snapshot_of {
            attach_snapshots(&mut draft, policy, self.provider.as_ref(), entity, locale);
        }
        let provider = self.provider.as_ref();
        expand(draft, owner.as_ref(), &policy.field_partitions, |auditable_type, id| {
            provider.destination_data_for(auditable_type, id, locale)
        })
    }

    /// Every draft `mutation` produces, ready to persist.
    ///
    /// # Errors
    ///
    /// Returns an error if a transformer cannot be applied.
    pub fn drafts_for(&self, mutation: &Mutation, locale: &str) -> Result<Vec<Draft>, CaptureError> {
        let Some(capture) = self.capture(mutation)? else {
            return Ok(Vec::new());
        };
        let Some(policy) = self.registry.policy(&mutation.entity.type_name) else {
            return Ok(Vec::new());
        };
        Ok(self.finish(policy, capture, Some(&mutation.entity), locale))
    }
}
