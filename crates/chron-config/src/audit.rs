//! Audit capture defaults.

use serde::{Deserialize, Serialize};

use crate::routes::RouteConfig;

fn default_ignored_attributes() -> Vec<String> {
    ["lock_version", "created_at", "updated_at", "created_on", "updated_on"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_inheritance_column() -> String {
    String::from("type")
}

fn default_locale() -> String {
    String::from("en")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    /// Attributes never audited on any type.
    #[serde(default = "default_ignored_attributes")]
    pub ignored_attributes: Vec<String>,

    /// Single-table inheritance discriminator, always ignored.
    #[serde(default = "default_inheritance_column")]
    pub inheritance_column: String,

    /// Locale used when the caller supplies none.
    #[serde(default = "default_locale")]
    pub default_locale: String,

    /// Extra route every worker-produced record is mirrored to, keyed by actor.
    #[serde(default)]
    pub actor_route: Option<RouteConfig>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            ignored_attributes: default_ignored_attributes(),
            inheritance_column: default_inheritance_column(),
            default_locale: default_locale(),
            actor_route: None,
        }
    }
}
