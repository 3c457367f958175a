//! End-to-end tests for the harness
//!
//! These run the YAML suites in tests/fixtures against the in-memory
//! fixture app, both through the library and through the built binary
//! (`run --fixture`). No automation server is needed.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use e2e_harness::common::config::Config;
use e2e_harness::fixture::FixtureApp;
use e2e_harness::testing::{run_suite, Outcome, RunOptions, Suite};

const CONFIG: &str = r#"
[timeouts]
find_ms = 500
poll_interval_ms = 10
readiness_ms = 100

[gestures]
hold_ms = 0

[targets.ios-sim]
platform = "ios"
capabilities = { deviceName = "iPhone 14", app = "/tmp/TestForE2E.app" }

[targets.android-emu]
platform = "android"
capabilities = { deviceName = "emulator-5554", appPackage = "com.testfore2e", appActivity = ".MainActivity" }
"#;

/// Test context with a scratch directory and a config file
struct TestContext {
    /// Removed on drop
    temp_dir: tempfile::TempDir,
    config_path: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, CONFIG).expect("Failed to write config");
        Self {
            temp_dir,
            config_path,
        }
    }

    /// Write a suite file into the scratch directory
    fn write_suite(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, content).expect("Failed to write suite");
        path
    }

    /// Run the harness binary with this context's config
    fn run(&self, args: &[&str]) -> HarnessOutput {
        let output = Command::new(env!("CARGO_BIN_EXE_e2e-harness"))
            .arg("--config")
            .arg(&self.config_path)
            .args(args)
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to run e2e-harness");

        HarnessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            code: output.status.code(),
        }
    }
}

/// Output from a harness run
#[derive(Debug)]
struct HarnessOutput {
    stdout: String,
    stderr: String,
    code: Option<i32>,
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn fixture_str(name: &str) -> String {
    fixture(name).display().to_string()
}

fn quiet() -> RunOptions {
    RunOptions {
        quiet: true,
        verbose: false,
    }
}

// ============== Library ==============

#[tokio::test]
async fn test_demo_suite_passes() {
    let config = Config::parse(CONFIG).unwrap();
    let suite = Suite::load(&fixture("demo.yml")).unwrap();
    let app = Arc::new(FixtureApp::new());

    let report = run_suite(&suite, &config, app.clone(), quiet()).await.unwrap();

    for result in &report.results {
        assert_eq!(
            result.outcome,
            Outcome::Passed,
            "{}: {:?}",
            result.name,
            result.failure_detail
        );
        assert_eq!(result.steps_run, result.steps_total);
    }
    assert_eq!(report.results.len(), 5);
    assert_eq!(app.sessions_opened(), 5);
    assert_eq!(app.open_sessions(), 0);
}

#[tokio::test]
async fn test_failing_suite_outcomes() {
    let config = Config::parse(CONFIG).unwrap();
    let suite = Suite::load(&fixture("failing.yml")).unwrap();
    let app = Arc::new(FixtureApp::new());

    let report = run_suite(&suite, &config, app.clone(), quiet()).await.unwrap();

    let outcomes: Vec<Outcome> = report.results.iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![Outcome::Failed, Outcome::Errored, Outcome::Passed]
    );

    let detail = report.results[0].failure_detail.as_deref().unwrap();
    assert!(detail.contains("Sign in"), "{}", detail);
    assert!(detail.contains("Login"), "{}", detail);

    // Every scenario's session was torn down, including the failed ones
    assert_eq!(app.sessions_opened(), 3);
    assert_eq!(app.sessions_closed(), 3);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_unreachable_server_errors_suite() {
    let config = Config::parse(CONFIG).unwrap();
    let suite = Suite::load(&fixture("demo.yml")).unwrap();

    let report = run_suite(&suite, &config, Arc::new(FixtureApp::unreachable()), quiet())
        .await
        .unwrap();
    assert!(report.results.iter().all(|r| r.outcome == Outcome::Errored));
    assert!(report.results[0]
        .failure_detail
        .as_deref()
        .unwrap()
        .contains("not ready"));
}

// ============== Binary ==============

#[test]
fn test_run_fixture_json() {
    let ctx = TestContext::new();
    let output = ctx.run(&["run", "--fixture", "--json", &fixture_str("demo.yml")]);

    assert_eq!(output.code, Some(0), "stderr: {}", output.stderr);
    let reports: serde_json::Value =
        serde_json::from_str(&output.stdout).expect("stdout should be JSON");
    let results = reports[0]["results"].as_array().unwrap();
    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r["outcome"] == "passed"));
    assert_eq!(reports[0]["target"], "ios-sim");
}

#[test]
fn test_run_failing_exit_code() {
    let ctx = TestContext::new();
    let output = ctx.run(&["run", "--fixture", &fixture_str("failing.yml")]);

    assert_eq!(output.code, Some(1), "stdout: {}", output.stdout);
    assert!(output.stdout.contains("1 passed, 1 failed, 1 errored"), "{}", output.stdout);
}

#[test]
fn test_run_several_suites() {
    let ctx = TestContext::new();
    let output = ctx.run(&[
        "run",
        "--fixture",
        "--json",
        &fixture_str("demo.yml"),
        &fixture_str("failing.yml"),
    ]);

    assert_eq!(output.code, Some(1));
    let reports: serde_json::Value = serde_json::from_str(&output.stdout).unwrap();
    assert_eq!(reports.as_array().unwrap().len(), 2);
    assert_eq!(reports[1]["suite"], "failing");
}

#[test]
fn test_run_bad_target_in_later_suite_runs_nothing() {
    let ctx = TestContext::new();
    let bad = ctx.write_suite(
        "bad.yml",
        "name: bad\ntarget: nope\nscenarios:\n  - name: s\n    steps: [{ action: pause, ms: 1 }]\n",
    );
    let output = ctx.run(&["run", "--fixture", &fixture_str("demo.yml"), bad.to_str().unwrap()]);

    assert_eq!(output.code, Some(1), "stdout: {}", output.stdout);
    assert!(output.stderr.contains("Unknown target 'nope'"), "{}", output.stderr);
    assert!(!output.stdout.contains("Running Suite"), "{}", output.stdout);
}

#[test]
fn test_check() {
    let ctx = TestContext::new();
    let output = ctx.run(&["check", &fixture_str("demo.yml"), &fixture_str("failing.yml")]);
    assert_eq!(output.code, Some(0), "stdout: {}", output.stdout);
    assert!(output.stdout.contains("5 scenario(s), iOS on 127.0.0.1:4723"));

    let bad = ctx.write_suite(
        "bad.yml",
        "name: bad\ntarget: watch\nscenarios:\n  - name: s\n    steps: [{ action: pause, ms: 1 }]\n",
    );
    let output = ctx.run(&["check", bad.to_str().unwrap()]);
    assert_eq!(output.code, Some(1));
    assert!(output.stdout.contains("Unknown target 'watch'"), "{}", output.stdout);
}

#[test]
fn test_check_rejects_missing_app() {
    let ctx = TestContext::new();
    let suite = ctx.write_suite(
        "no-app.yml",
        r#"
name: no app
target:
  platform: ios
  capabilities:
    deviceName: iPhone 14
scenarios:
  - name: s
    steps: [{ action: wait_for, locator: "~app-root" }]
"#,
    );
    let output = ctx.run(&["check", suite.to_str().unwrap()]);
    assert_eq!(output.code, Some(1));
    assert!(output.stdout.contains("Invalid capabilities"), "{}", output.stdout);
}

#[test]
fn test_run_missing_file() {
    let ctx = TestContext::new();
    let output = ctx.run(&["run", "--fixture", "/nonexistent/suite.yml"]);
    assert_eq!(output.code, Some(1));
    assert!(output.stderr.contains("Failed to read file"), "{}", output.stderr);
}
