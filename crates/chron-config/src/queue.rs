//! Durable queue configuration.

use serde::{Deserialize, Serialize};

fn default_queue_name() -> String {
    String::from("chronicle_audits")
}

fn default_queue_dir() -> String {
    String::from(".chronicle/queue")
}

/// How drafts reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Persist inline with the mutation.
    #[default]
    Sync,
    /// Enqueue and let a worker persist.
    Async,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_name")]
    pub name: String,

    /// Directory holding the JSONL queue files.
    #[serde(default = "default_queue_dir")]
    pub dir: String,

    #[serde(default)]
    pub mode: DispatchMode,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
            dir: default_queue_dir(),
            mode: DispatchMode::default(),
        }
    }
}
