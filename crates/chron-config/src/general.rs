//! Settings for the `chron` inspection CLI.

use serde::{Deserialize, Serialize};

const fn default_row_limit() -> u32 {
    20
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Row limit applied to `chron query` when `--limit` is absent.
    #[serde(default = "default_row_limit")]
    pub default_limit: u32,

    /// Bucket queried when `--bucket` is absent. Empty means the current
    /// two-digit year.
    #[serde(default)]
    pub default_bucket: String,
}

impl GeneralConfig {
    /// The configured default bucket, if one is set.
    #[must_use]
    pub fn bucket(&self) -> Option<&str> {
        let bucket = self.default_bucket.trim();
        (!bucket.is_empty()).then_some(bucket)
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_limit: default_row_limit(),
            default_bucket: String::new(),
        }
    }
}
