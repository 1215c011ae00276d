//! Durable queue message envelope.
//!
//! Asynchronous dispatch serializes the draft's raw attributes plus an actor
//! stamp into a `QueueMessage`. The worker re-resolves everything else from
//! live state, so the payload deliberately carries no fan-out result.
//!
//! The `v` field supports payload versioning: messages without a `v` field
//! deserialize with `v == 1` via `#[serde(default)]`.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Row;
use crate::actor::ActorStamp;
use crate::bucket::TemporalBucket;
use crate::changes::AuditedChanges;
use crate::draft::Draft;
use crate::enums::AuditAction;
use crate::keys::EntityKey;

/// Current payload version.
pub const MESSAGE_VERSION: u32 = 1;

const fn default_message_version() -> u32 {
    MESSAGE_VERSION
}

/// The draft attributes captured at mutation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AuditPayload {
    pub auditable_type: String,
    #[serde(default)]
    pub auditable_id: Option<EntityKey>,
    pub action: AuditAction,
    #[serde(default)]
    pub audited_changes: AuditedChanges,
    /// Owner type resolved at mutation time. Used by the worker only when live
    /// state cannot be reloaded (destroy).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associated_ids: Vec<EntityKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub actor: ActorStamp,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: Row,
}

impl AuditPayload {
    /// The base draft (before fan-out) described by this payload.
    #[must_use]
    pub fn base_draft(&self) -> Draft {
        let mut draft = Draft::new(
            self.auditable_type.clone(),
            self.auditable_id.clone(),
            self.action,
        )
        .with_changes(self.audited_changes.clone())
        .with_comment(self.comment.clone());
        draft.extra = self.extra.clone();
        draft
    }
}

/// A single message on the durable audit queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QueueMessage {
    /// Payload version. Defaults to 1 for messages without this field.
    #[serde(default = "default_message_version")]
    pub v: u32,

    /// Queue the message was enqueued on.
    pub queue: String,

    pub payload: AuditPayload,

    /// Keyspace generation the worker must write into.
    pub temporal_bucket: TemporalBucket,

    /// Locale the mutation happened under, for snapshot rendering.
    pub locale: String,

    pub enqueued_at: DateTime<Utc>,
}
