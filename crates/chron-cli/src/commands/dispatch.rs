use chron_config::ChronConfig;

use crate::cli::{Commands, GlobalFlags};
use crate::commands;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(
    command: Commands,
    config: &ChronConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match command {
        Commands::Query(args) => commands::query::run(&args, config, flags).await,
        Commands::Queue { action } => commands::queue::handle(&action, config, flags).await,
        Commands::Config => commands::config::run(config, flags),
    }
}
