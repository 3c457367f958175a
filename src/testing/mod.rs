//! Scenario runner
//!
//! Reads YAML suites and runs them scenario by scenario through the
//! [`Driver`](crate::driver::Driver), reporting each as passed, failed or
//! errored.

mod config;
mod report;
mod runner;

pub use config::*;
pub use report::{Outcome, ScenarioResult, SuiteReport};
pub use runner::{classify, run_suite, RunOptions, ScenarioState};
