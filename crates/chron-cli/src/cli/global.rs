use clap::ValueEnum;

/// How query rows and queue entries are printed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Raw,
}

/// Flags accepted on every `chron` subcommand.
#[derive(Clone, Debug)]
pub struct GlobalFlags {
    pub format: OutputFormat,
    /// Overrides `general.default_limit` for queries.
    pub limit: Option<u32>,
}
