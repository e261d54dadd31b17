//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// icsync - Sync ICS calendar feeds into a record store
#[derive(Debug, Parser)]
#[command(name = "icsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "ICSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one sync cycle and print what it did
    Once {
        /// Print the cycle report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run sync cycles periodically until interrupted
    Daemon {
        /// Seconds between cycles (overrides the config file)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Print the cached fetch state of every feed
    State,

    /// Parse the configuration and list the resolved feeds
    CheckConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["icsync", "once", "--json", "-c", "/tmp/c.toml", "-v"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(cli.debug);
        assert!(matches!(cli.command, Command::Once { json: true }));
    }

    #[test]
    fn parses_daemon_interval() {
        let cli = Cli::try_parse_from(["icsync", "--json-logs", "daemon", "--interval", "60"])
            .unwrap();
        assert!(cli.json_logs);
        assert!(matches!(cli.command, Command::Daemon { interval: Some(60) }));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["icsync"]).is_err());
    }
}
