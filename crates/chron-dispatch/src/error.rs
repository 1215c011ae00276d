//! Dispatch, queue and worker error types.

use chron_capture::CaptureError;
use chron_core::keys::EntityKey;
use chron_db::StoreError;
use thiserror::Error;

/// Errors from the durable queue transport.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Queue message encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Another process held the queue lock past the wait timeout.
    #[error("Queue lock {path} is held (pid {holder:?})")]
    Locked { path: String, holder: Option<u32> },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors on the mutation path. Logged by the dispatcher, never returned to
/// the host.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors while re-materializing one queue message. Terminal for that
/// message.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Unsupported queue message version {0}")]
    UnsupportedVersion(u32),

    #[error("Type not audited: {0}")]
    UnknownType(String),

    /// The entity no longer resolves by its primary key.
    #[error("{type_name} {id} no longer exists")]
    EntityMissing { type_name: String, id: EntityKey },

    #[error("Payload for {0} has no auditable id")]
    MissingId(String),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Host lookup failed: {0}")]
    Host(#[from] anyhow::Error),
}
