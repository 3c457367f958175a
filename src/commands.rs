//! CLI command definitions
//!
//! Defines the clap commands for the harness CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run one or more YAML suites
    Run {
        /// Suite files, run in the order given
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Run against the built-in fixture app instead of a server
        #[arg(long)]
        fixture: bool,

        /// Print the reports as JSON instead of colored text
        #[arg(long)]
        json: bool,

        /// Print every step, not only failures
        #[arg(long, short)]
        verbose: bool,
    },

    /// Validate suite files and resolve their targets without running them
    Check {
        /// Suite files to check
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Query an automation server's readiness
    Status {
        /// Target whose endpoint to query (default: [server] from the config)
        #[arg(long)]
        target: Option<String>,

        /// Wait up to `timeouts.readiness_ms` for the server to become ready
        #[arg(long)]
        wait: bool,
    },
}
