//! Scenario results and suite reports

use std::time::Duration;

use colored::Colorize;
use serde::Serialize;

/// Terminal outcome of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    /// An assertion did not hold
    Failed,
    /// Anything else went wrong: connection, lookup, teardown...
    Errored,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Errored => write!(f, "errored"),
        }
    }
}

/// Result of one scenario
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_detail: Option<String>,
    pub steps_run: usize,
    pub steps_total: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }
}

/// Ordered results of one suite
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub suite: String,
    pub target: String,
    pub results: Vec<ScenarioResult>,
}

impl SuiteReport {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(ScenarioResult::passed)
    }

    /// Process exit code: 1 if any scenario failed or errored
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }

    /// Print a colored summary to stdout
    pub fn print_summary(&self) {
        println!("\n{} {}", "Suite:".blue().bold(), self.suite.white().bold());
        for result in &self.results {
            let mark = match result.outcome {
                Outcome::Passed => "✓".green(),
                Outcome::Failed => "✗".red(),
                Outcome::Errored => "!".yellow(),
            };
            println!(
                "  {} {} {}",
                mark,
                result.name,
                format!(
                    "({}/{} steps, {}ms)",
                    result.steps_run,
                    result.steps_total,
                    result.elapsed.as_millis()
                )
                .dimmed()
            );
            if let Some(detail) = &result.failure_detail {
                println!("      {}", detail.red());
            }
        }

        let line = format!(
            "{} passed, {} failed, {} errored",
            self.count(Outcome::Passed),
            self.count(Outcome::Failed),
            self.count(Outcome::Errored)
        );
        if self.all_passed() {
            println!("\n{}\n", line.green().bold());
        } else {
            println!("\n{}\n", line.red().bold());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, outcome: Outcome) -> ScenarioResult {
        ScenarioResult {
            name: name.to_string(),
            outcome,
            failure_detail: (outcome != Outcome::Passed).then(|| "boom".to_string()),
            steps_run: 1,
            steps_total: 2,
            elapsed: Duration::from_millis(1500),
        }
    }

    #[test]
    fn test_exit_code() {
        let mut report = SuiteReport {
            suite: "demo".to_string(),
            target: "fixture".to_string(),
            results: vec![result("a", Outcome::Passed)],
        };
        assert_eq!(report.exit_code(), 0);

        report.results.push(result("b", Outcome::Errored));
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.count(Outcome::Errored), 1);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(result("login", Outcome::Failed)).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["elapsed_ms"], 1500);
        assert_eq!(json["failure_detail"], "boom");

        let json = serde_json::to_value(result("login", Outcome::Passed)).unwrap();
        assert!(json.get("failure_detail").is_none());
    }
}
