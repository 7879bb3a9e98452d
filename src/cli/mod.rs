//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use commands::{ListCommand, RunCommand};
use std::ffi::OsString;
use tracing::Level;

/// Run staged end-to-end test procedures
#[derive(Debug, Parser, Clone)]
#[command(name = "e2e")]
#[command(version)]
#[command(about = "Run staged end-to-end test procedures against Docker containers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level
    #[arg(short, long, global = true, value_enum, default_value_t = Verbosity::Info)]
    pub verbosity: Verbosity,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a test procedure
    Run(RunCommand),

    /// List containers known to the Docker daemon
    List(ListCommand),

    /// Print the version
    Version,
}

/// Log levels selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Verbosity {
    Info,
    Debug,
    Trace,
}

impl From<Verbosity> for Level {
    fn from(verbosity: Verbosity) -> Self {
        match verbosity {
            Verbosity::Info => Level::INFO,
            Verbosity::Debug => Level::DEBUG,
            Verbosity::Trace => Level::TRACE,
        }
    }
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_stages() {
        let cli = Cli::try_parse_from(["e2e", "run", "-t", "smoke", "-s", "setup,verify"]).unwrap();
        assert_eq!(cli.verbosity, Verbosity::Info);
        match cli.command {
            Command::Run(cmd) => {
                assert_eq!(cmd.test, "smoke");
                assert_eq!(cmd.stage_filter().len(), 2);
                assert!(cmd.stage_filter().contains("verify"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_run_requires_test_name() {
        assert!(Cli::try_parse_from(["e2e", "run"]).is_err());
    }

    #[test]
    fn test_global_verbosity() {
        let cli = Cli::try_parse_from(["e2e", "list", "--all", "-v", "trace"]).unwrap();
        assert_eq!(Level::from(cli.verbosity), Level::TRACE);
        match cli.command {
            Command::List(cmd) => {
                assert!(cmd.all);
                assert!(!cmd.json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_verbosity_rejected() {
        assert!(Cli::try_parse_from(["e2e", "version", "--verbosity", "loud"]).is_err());
    }
}
