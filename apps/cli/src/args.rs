use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Local usage-log sync agent.
///
/// Scans token-usage logs, keeps per-day totals on disk and uploads them to a
/// remote ledger.
#[derive(Parser, Debug)]
#[command(name = "usage-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one sync pass
    Sync {
        /// Parse and aggregate without uploading or saving state
        #[arg(long)]
        dry_run: bool,
    },
    /// Sync repeatedly until interrupted
    Watch,
    /// Show the last run and recent totals
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sync_flags() {
        let cli = Cli::parse_from(["usage-sync", "--verbose", "sync", "--dry-run"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Sync { dry_run: true }));
    }

    #[test]
    fn global_config_after_subcommand() {
        let cli = Cli::parse_from(["usage-sync", "status", "--json", "--config", "/tmp/c.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(matches!(cli.command, Command::Status { json: true }));
    }
}
