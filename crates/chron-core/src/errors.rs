//! Cross-cutting error types for Chronicle.
//!
//! Domain-specific errors (`CaptureError`, `StoreError`, `QueueError`) live in
//! their respective crates. This module only covers failures that can happen
//! while encoding or decoding the shared types.

use thiserror::Error;

/// Errors that can be raised by any Chronicle crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A payload could not be serialized or parsed as JSON.
    #[error("Payload encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Data failed validation (unexpected shape, missing field).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
