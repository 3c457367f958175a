//! e2e-harness - end-to-end tests for mobile apps
//!
//! Runs YAML test suites against an app through an Appium-compatible
//! WebDriver server.

use std::path::PathBuf;

use clap::Parser;
use commands::Commands;
use e2e_harness::common::{config::Config, logging};
use e2e_harness::{cli, commands};

#[derive(Parser)]
#[command(name = "e2e-harness", about = "End-to-end test runner for mobile apps")]
#[command(version, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/e2e-harness/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging on stderr
    #[arg(long, global = true)]
    debug: bool,

    /// Also write a trace log to the data directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.log_file {
        if let Some(path) = logging::init_with_file(cli.debug) {
            tracing::debug!("Logging to {}", path.display());
        }
    } else {
        logging::init_cli(cli.debug);
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    let result = match config {
        Ok(config) => cli::dispatch(cli.command, &config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
