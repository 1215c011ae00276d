//! # chron-config
//!
//! Layered configuration loading for Chronicle using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`CHRONICLE_*` prefix, `__` as separator)
//! 2. Project-level `.chronicle/config.toml`
//! 3. User-level `~/.config/chronicle/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `CHRONICLE_QUEUE__MODE` -> `queue.mode`,
//! `CHRONICLE_STORE__DATA_DIR` -> `store.data_dir`, etc.
//! The `__` (double underscore) separates nested config sections.
//!
//! # Usage
//!
//! ```no_run
//! use chron_config::ChronConfig;
//!
//! let config = ChronConfig::load_with_dotenv().expect("config");
//! println!("queue: {}", config.queue.name);
//! ```

mod audit;
mod error;
mod general;
mod queue;
mod routes;
mod store;

pub use audit::AuditConfig;
pub use error::ConfigError;
pub use general::GeneralConfig;
pub use queue::{DispatchMode, QueueConfig};
pub use routes::{PartitionSource, RouteConfig};
pub use store::StoreConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChronConfig {
    #[serde(default)]
    pub store: StoreConfig,
    /// Partition routes keyed by `associated_type`.
    #[serde(default)]
    pub routes: BTreeMap<String, RouteConfig>,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub general: GeneralConfig,
}

impl ChronConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy` -- use [`Self::load_with_dotenv`] if you need
    /// `.env` file loading.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a source fails to parse or a value is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `.env` file support.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a source fails to parse or a value is invalid.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        Self::load_dotenv_from_workspace();
        Self::load()
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment or layer extra providers.
    #[must_use]
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Layer 1: User-global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        // Layer 2: Project-local config
        let local_path = PathBuf::from(".chronicle/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        // Layer 3: Environment variables (highest priority)
        figment.merge(Env::prefixed("CHRONICLE_").split("__"))
    }

    /// Reject values that would make every write fail.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.default_table.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "store.default_table".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.queue.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "queue.name".into(),
                reason: "must not be empty".into(),
            });
        }
        let actor_route = self
            .audit
            .actor_route
            .iter()
            .map(|r| ("audit.actor_route".to_string(), r));
        let routes = self.routes.iter().map(|(k, r)| (format!("routes.{k}"), r));
        for (field, route) in routes.chain(actor_route) {
            if route.table.trim().is_empty() || route.partition_column.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "table and partition_column are required".into(),
                });
            }
        }
        Ok(())
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("chronicle").join("config.toml"))
    }

    /// Load `.env` from the workspace root.
    ///
    /// Walks up from `CARGO_MANIFEST_DIR` (if available) or uses the current
    /// dir. Silently does nothing if no `.env` is found.
    fn load_dotenv_from_workspace() {
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let mut dir = PathBuf::from(manifest_dir);
            // crate -> crates/ -> workspace root
            for _ in 0..3 {
                let env_path = dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                    return;
                }
                if !dir.pop() {
                    break;
                }
            }
        }

        let _ = dotenvy::dotenv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ChronConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.routes.is_empty());
        assert_eq!(config.queue.mode, DispatchMode::Sync);
    }

    #[test]
    fn figment_builds_without_files() {
        let config: ChronConfig = ChronConfig::figment()
            .extract()
            .expect("should extract defaults");
        assert_eq!(config.general.default_limit, 20);
        assert_eq!(config.queue.name, "chronicle_audits");
    }

    #[test]
    fn blank_route_table_is_rejected() {
        let mut config = ChronConfig::default();
        config.routes.insert(
            "Department".into(),
            RouteConfig::new("", "department_id", PartitionSource::AssociatedId),
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("routes.Department"));
    }
}
