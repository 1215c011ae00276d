//! Errors raised while loading or validating `ChronConfig`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A provider failed to parse or a key had the wrong shape.
    #[error("failed to load chronicle configuration: {0}")]
    Figment(#[from] figment::Error),

    /// A value parsed but breaks a cross-field rule.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}
