//! CLI command handling
//!
//! Dispatches CLI commands and formats their output. Returns the process
//! exit code.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::{Config, ServerConfig};
use crate::common::Result;
use crate::driver::SessionManager;
use crate::fixture::FixtureApp;
use crate::testing::{self, RunOptions, Suite, SuiteReport};
use crate::webdriver::{Remote, WebDriverClient};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: &Config) -> Result<i32> {
    match command {
        Commands::Run {
            paths,
            fixture,
            json,
            verbose,
        } => run(&paths, config, fixture, json, verbose).await,
        Commands::Check { paths } => Ok(check(&paths, config)),
        Commands::Status { target, wait } => status(target.as_deref(), wait, config).await,
    }
}

fn connect(server: &ServerConfig, config: &Config) -> Result<Arc<dyn Remote>> {
    let client = WebDriverClient::new(server, Duration::from_secs(config.timeouts.request_secs))?;
    Ok(Arc::new(client))
}

async fn run(paths: &[PathBuf], config: &Config, fixture: bool, json: bool, verbose: bool) -> Result<i32> {
    // Parse and resolve everything first so a typo in the last file doesn't
    // waste a device run, or discard the reports of suites already run
    let mut suites = Vec::with_capacity(paths.len());
    for path in paths {
        let suite = Suite::load(path)?;
        let session = suite.session_config(config)?;
        session.w3c_capabilities()?;
        suites.push((suite, session.server));
    }

    let options = RunOptions {
        quiet: json,
        verbose,
    };
    let mut reports: Vec<SuiteReport> = Vec::with_capacity(suites.len());

    for (suite, server) in &suites {
        let remote: Arc<dyn Remote> = if fixture {
            Arc::new(FixtureApp::new())
        } else {
            connect(server, config)?
        };

        let report = testing::run_suite(suite, config, remote, options).await?;
        if !json {
            report.print_summary();
        }
        reports.push(report);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    Ok(reports.iter().map(SuiteReport::exit_code).max().unwrap_or(0))
}

fn check(paths: &[PathBuf], config: &Config) -> i32 {
    let mut code = 0;
    for path in paths {
        let checked = Suite::load(path).and_then(|suite| {
            let session = suite.session_config(config)?;
            session.w3c_capabilities()?;
            Ok((suite, session))
        });

        match checked {
            Ok((suite, session)) => println!(
                "{} {}: {} scenario(s), {} on {}:{}",
                "✓".green(),
                path.display(),
                suite.scenarios.len(),
                session.platform,
                session.server.host,
                session.server.port
            ),
            Err(e) => {
                println!("{} {}: {}", "✗".red(), path.display(), e);
                code = 1;
            }
        }
    }
    code
}

async fn status(target: Option<&str>, wait: bool, config: &Config) -> Result<i32> {
    let server = match target {
        Some(name) => config
            .get_target(name)?
            .server
            .unwrap_or_else(|| config.server.clone()),
        None => config.server.clone(),
    };
    let remote = connect(&server, config)?;
    let endpoint = remote.endpoint();

    let ready = if wait {
        let manager = SessionManager::new(remote);
        let timeout = Duration::from_millis(config.timeouts.readiness_ms);
        let poll = Duration::from_millis(config.timeouts.poll_interval_ms);
        match manager.wait_ready(timeout, poll).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("{}", e);
                false
            }
        }
    } else {
        remote.status().await?
    };

    if ready {
        println!("{} {} is ready", "✓".green(), endpoint);
        Ok(0)
    } else {
        println!("{} {} is not ready", "✗".red(), endpoint);
        Ok(1)
    }
}
