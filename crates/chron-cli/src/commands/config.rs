use chron_config::ChronConfig;

use crate::cli::GlobalFlags;
use crate::output::output;

/// Handle `chron config`.
pub fn run(config: &ChronConfig, flags: &GlobalFlags) -> anyhow::Result<()> {
    output(config, flags.format)
}
