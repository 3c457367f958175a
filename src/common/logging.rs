//! Logging and tracing configuration
//!
//! Console logs go to stderr so the scenario report on stdout stays
//! machine-readable with `--json`.

use std::path::PathBuf;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use super::paths;

/// Name of the log file written by [`init_with_file`]
const LOG_FILE: &str = "harness.log";

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("e2e_harness=debug,warn")
        } else {
            EnvFilter::new("e2e_harness=info,warn")
        }
    })
}

/// Initialize tracing for the CLI (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate (DEBUG with `verbose`), WARN for
/// dependencies.
pub fn init_cli(verbose: bool) {
    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// Initialize tracing to stderr and to `<data dir>/logs/harness.log`
///
/// The file gets every WebDriver request at TRACE level unless `RUST_LOG`
/// says otherwise. Falls back to [`init_cli`] when the log directory can't
/// be created.
pub fn init_with_file(verbose: bool) -> Option<PathBuf> {
    let log_dir = match paths::ensure_log_dir() {
        Ok(Some(dir)) => dir,
        _ => {
            init_cli(verbose);
            return None;
        }
    };
    let log_file = log_dir.join(LOG_FILE);

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: Could not open log file: {}", e);
            init_cli(verbose);
            return None;
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("e2e_harness=trace,info"));

    let file_layer = fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .compact()
        .with_filter(default_filter(verbose));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Some(log_file)
}
