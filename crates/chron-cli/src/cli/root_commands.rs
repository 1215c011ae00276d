use clap::{Args, Subcommand};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Read audit records from one table of a keyspace.
    Query(QueryArgs),
    /// Inspect the durable audit queue.
    Queue {
        #[command(subcommand)]
        action: QueueCommands,
    },
    /// Print the resolved configuration.
    Config,
}

#[derive(Clone, Debug, Args)]
pub struct QueryArgs {
    /// Table to read. Defaults to the configured default table.
    pub table: Option<String>,

    /// Pin the table's partition column to this value.
    #[arg(long)]
    pub partition: Option<String>,

    /// Field condition: `field=value`, `field>value`, `field>=value`,
    /// `field<value` or `field<=value`. A JSON array with `=` matches any
    /// element. Repeatable.
    #[arg(long = "where", value_name = "CONDITION")]
    pub conditions: Vec<String>,

    /// Sort field, optionally suffixed with `:asc` or `:desc`. Repeatable.
    #[arg(long, value_name = "FIELD[:DIR]")]
    pub order: Vec<String>,

    /// Allow conditions that do not pin a partition.
    #[arg(long)]
    pub allow_filtering: bool,

    /// Keyspace bucket (two-digit year). Defaults to the current year.
    #[arg(long)]
    pub bucket: Option<String>,

    /// Return only the last record of the bounded, ordered result.
    #[arg(long, conflicts_with = "first")]
    pub last: bool,

    /// Return only the first record.
    #[arg(long)]
    pub first: bool,
}

#[derive(Clone, Debug, Subcommand)]
pub enum QueueCommands {
    /// List messages waiting or in flight, without taking them.
    Inspect,
    /// Count messages waiting or in flight.
    Pending,
}
