use anyhow::Context;
use chron_config::ChronConfig;
use chron_dispatch::{AuditQueue, JsonlQueue};
use serde_json::json;

use crate::cli::{GlobalFlags, QueueCommands};
use crate::output::output;

/// Handle `chron queue`.
pub async fn handle(
    action: &QueueCommands,
    config: &ChronConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let queue = JsonlQueue::open(&config.queue.dir, config.queue.name.clone())
        .with_context(|| format!("failed to open queue directory {}", config.queue.dir))?;

    match action {
        QueueCommands::Inspect => {
            let mut messages = queue.peek().await?;
            if let Some(limit) = flags.limit {
                messages.truncate(limit as usize);
            }
            output(&messages, flags.format)
        }
        QueueCommands::Pending => {
            let pending = queue.pending().await?;
            output(
                &json!({"queue": queue.name(), "pending": pending}),
                flags.format,
            )
        }
    }
}
