//! Capture error types.

use chron_core::errors::CoreError;
use thiserror::Error;

/// Errors from building drafts out of a mutation.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// A policy names a relation the graph does not have.
    #[error("Unknown relation '{relation}' on {type_name}")]
    UnknownRelation { type_name: String, relation: String },

    /// The host entity layer failed.
    #[error("Host lookup failed: {0}")]
    Host(#[from] anyhow::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}
