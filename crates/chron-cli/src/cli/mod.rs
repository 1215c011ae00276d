use clap::Parser;

pub mod global;
pub mod root_commands;

pub use global::{GlobalFlags, OutputFormat};
pub use root_commands::{Commands, QueryArgs, QueueCommands};

/// Top-level CLI parser for the `chron` binary.
#[derive(Debug, Parser)]
#[command(name = "chron", version, about = "Chronicle - partitioned audit trail")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, raw
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Max results to return
    #[arg(short, long, global = true)]
    pub limit: Option<u32>,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    #[must_use]
    pub const fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use pretty_assertions::assert_eq;

    use super::{Cli, Commands, OutputFormat, QueueCommands};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn query_collects_repeated_conditions() {
        let cli = Cli::try_parse_from([
            "chron",
            "query",
            "study_plan_audits",
            "--partition",
            "12",
            "--where",
            "action=update",
            "--where",
            "created_at>=1700000000000",
            "--order",
            "created_at:desc",
            "--limit",
            "5",
        ])
        .expect("cli should parse");

        let Commands::Query(args) = cli.command else {
            panic!("expected query");
        };
        assert_eq!(args.table.as_deref(), Some("study_plan_audits"));
        assert_eq!(args.partition.as_deref(), Some("12"));
        assert_eq!(args.conditions.len(), 2);
        assert_eq!(args.order, vec!["created_at:desc".to_string()]);
        assert_eq!(cli.limit, Some(5));
    }

    #[test]
    fn first_and_last_conflict() {
        let parsed = Cli::try_parse_from(["chron", "query", "--first", "--last"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["chron", "queue", "pending", "--format", "raw", "--quiet"])
            .expect("cli should parse");
        assert_eq!(cli.format, OutputFormat::Raw);
        assert!(cli.quiet);
        assert!(matches!(
            cli.command,
            Commands::Queue {
                action: QueueCommands::Pending
            }
        ));
    }
}
