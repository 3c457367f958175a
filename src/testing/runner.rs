//! Suite runner
//!
//! Every scenario gets its own session: open, run the suite's `before_each`
//! steps and then the scenario's own, close. Scenarios run one after another
//! and the session is always closed before the next one opens.

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tokio::time::Instant;

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::driver::{Action, Direction, Driver, Locator, Session, SessionConfig};
use crate::webdriver::Remote;

use super::config::{Scenario, Step, Suite};
use super::report::{Outcome, ScenarioResult, SuiteReport};

/// Console behaviour of a run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Print nothing to stdout (for `--json`)
    pub quiet: bool,
    /// Print every step, not only failures
    pub verbose: bool,
}

/// Lifecycle of one scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioState {
    Pending,
    Running,
    Finished(Outcome),
    Reported,
}

fn advance(scenario: &str, state: &mut ScenarioState, next: ScenarioState) {
    tracing::debug!("Scenario '{}': {:?} -> {:?}", scenario, state, next);
    *state = next;
}

/// `AssertionFailed` fails a scenario; every other error errors it
pub fn classify(error: &Error) -> Outcome {
    if error.is_assertion() {
        Outcome::Failed
    } else {
        Outcome::Errored
    }
}

/// Run every scenario of a suite against `remote`
///
/// Only target resolution errors are returned; everything that goes wrong
/// while running ends up in the report.
pub async fn run_suite(
    suite: &Suite,
    config: &Config,
    remote: Arc<dyn Remote>,
    options: RunOptions,
) -> Result<SuiteReport> {
    let session_config = suite.session_config(config)?;
    let mut driver = Driver::new(remote, config);
    let mut report = SuiteReport {
        suite: suite.name.clone(),
        target: suite.target.to_string(),
        results: Vec::with_capacity(suite.scenarios.len()),
    };

    if !options.quiet {
        println!(
            "\n{} {}",
            "Running Suite:".blue().bold(),
            suite.name.white().bold()
        );
        if let Some(desc) = &suite.description {
            println!("  {}", desc.dimmed());
        }
        println!(
            "  {}",
            format!("{} on {}", suite.target, driver.remote().endpoint()).dimmed()
        );
    }

    let readiness = Duration::from_millis(config.timeouts.readiness_ms);
    if let Err(e) = driver.wait_ready(readiness).await {
        tracing::error!("{}", e);
        if !options.quiet {
            println!("  {} {}", "✗".red(), e);
        }
        for scenario in &suite.scenarios {
            report.results.push(ScenarioResult {
                name: scenario.name.clone(),
                outcome: Outcome::Errored,
                failure_detail: Some(e.to_string()),
                steps_run: 0,
                steps_total: suite.before_each.len() + scenario.steps.len(),
                elapsed: Duration::ZERO,
            });
        }
        return Ok(report);
    }

    for scenario in &suite.scenarios {
        let result = run_scenario(&mut driver, suite, scenario, &session_config, config, options).await;
        report.results.push(result);
    }

    Ok(report)
}

async fn run_scenario(
    driver: &mut Driver,
    suite: &Suite,
    scenario: &Scenario,
    session_config: &SessionConfig,
    config: &Config,
    options: RunOptions,
) -> ScenarioResult {
    let steps: Vec<&Step> = suite.before_each.iter().chain(&scenario.steps).collect();
    let mut state = ScenarioState::Pending;
    let start = Instant::now();
    let mut steps_run = 0;

    if !options.quiet {
        println!("\n{} {}", "Scenario:".cyan(), scenario.name.white().bold());
        if let Some(desc) = &scenario.description {
            println!("  {}", desc.dimmed());
        }
    }
    advance(&scenario.name, &mut state, ScenarioState::Running);

    let (outcome, failure_detail) = match driver.sessions.open(session_config.clone()).await {
        Err(e) => {
            if !options.quiet {
                println!("  {} Session: {}", "✗".red(), e);
            }
            (Outcome::Errored, Some(format!("Session open failed: {}", e)))
        }
        Ok(mut session) => {
            let run = run_steps(driver, &session, &steps, config, options, &mut steps_run).await;
            let (mut outcome, mut detail) = match run {
                Ok(()) => (Outcome::Passed, None),
                Err(e) => (classify(&e), Some(e.to_string())),
            };

            if config.timeouts.teardown_pause_ms > 0 {
                driver
                    .actions
                    .pause(Duration::from_millis(config.timeouts.teardown_pause_ms))
                    .await;
            }
            if let Err(e) = driver.sessions.close(&mut session).await {
                if !options.quiet {
                    println!("  {} Teardown: {}", "✗".red(), e);
                }
                if outcome == Outcome::Passed {
                    outcome = Outcome::Errored;
                    detail = Some(format!("Teardown failed: {}", e));
                }
            }
            (outcome, detail)
        }
    };
    advance(&scenario.name, &mut state, ScenarioState::Finished(outcome));

    let result = ScenarioResult {
        name: scenario.name.clone(),
        outcome,
        failure_detail,
        steps_run,
        steps_total: steps.len(),
        elapsed: start.elapsed(),
    };

    tracing::info!(
        "Scenario '{}' {} in {}ms",
        result.name,
        result.outcome,
        result.elapsed.as_millis()
    );
    if !options.quiet {
        match outcome {
            Outcome::Passed => println!("  {} {}", "✓".green().bold(), "Passed".green().bold()),
            Outcome::Failed => println!("  {} {}", "✗".red().bold(), "Failed".red().bold()),
            Outcome::Errored => println!("  {} {}", "!".yellow().bold(), "Errored".yellow().bold()),
        }
    }
    advance(&scenario.name, &mut state, ScenarioState::Reported);

    result
}

/// Run steps in order, stopping at the first error
async fn run_steps(
    driver: &Driver,
    session: &Session,
    steps: &[&Step],
    config: &Config,
    options: RunOptions,
    steps_run: &mut usize,
) -> Result<()> {
    for (i, step) in steps.iter().enumerate() {
        let step_num = i + 1;
        *steps_run = step_num;
        tracing::debug!("Step {}: {}", step_num, step);

        match execute_step(driver, session, step, config).await {
            Ok(()) => {
                if options.verbose && !options.quiet {
                    println!("  {} Step {}: {}", "✓".green(), step_num, step.to_string().dimmed());
                }
            }
            Err(e) => {
                if !options.quiet {
                    println!("  {} Step {}: {}", "✗".red(), step_num, step);
                    println!("      {}", e);
                }
                return Err(e);
            }
        }
    }
    Ok(())
}

/// Find `locator` and perform `action` on it
async fn act(
    driver: &Driver,
    session: &Session,
    locator: &Locator,
    timeout: Option<Duration>,
    action: Action,
) -> Result<()> {
    let handle = driver.finder.find(session, locator, timeout).await?;
    driver.actions.execute(session, &handle, &action).await
}

/// Execute a single step
async fn execute_step(driver: &Driver, session: &Session, step: &Step, config: &Config) -> Result<()> {
    let timeout = step.timeout();
    match step {
        Step::SetValue { locator, text, .. } => {
            act(driver, session, locator, timeout, Action::SetValue(text.clone())).await
        }
        Step::Tap { locator, .. } => act(driver, session, locator, timeout, Action::Tap).await,
        Step::Gesture {
            locator: Some(locator),
            points,
            ..
        } => act(driver, session, locator, timeout, Action::Gesture(points.clone())).await,
        // Screen-wide gesture, no element to act on
        Step::Gesture {
            locator: None,
            points,
            ..
        } => driver.actions.gesture(session, None, points).await,
        Step::Scroll {
            locator,
            direction,
            amplitude,
            ..
        } => {
            let action = Action::Scroll {
                direction: *direction,
                amplitude: amplitude.unwrap_or(config.gestures.default_amplitude),
            };
            act(driver, session, locator, timeout, action).await
        }
        Step::ScrollUntilVisible {
            locator,
            target,
            direction,
            amplitude,
            max_scrolls,
            ..
        } => {
            scroll_until_visible(
                driver,
                session,
                locator,
                target,
                *direction,
                amplitude.unwrap_or(config.gestures.default_amplitude),
                max_scrolls.unwrap_or(config.gestures.max_scrolls),
                timeout,
            )
            .await
        }
        Step::WaitFor { locator, .. } => driver.finder.wait_for_exist(session, locator, timeout).await,
        Step::Assert { locator, .. } => driver.assert(session, locator, step.matcher()?, timeout).await,
        Step::Pause { ms } => {
            driver.actions.pause(Duration::from_millis(*ms)).await;
            Ok(())
        }
    }
}

/// Whether `locator` exists right now and is displayed
async fn is_visible(driver: &Driver, session: &Session, locator: &Locator) -> Result<bool> {
    match driver.finder.find(session, locator, Some(Duration::ZERO)).await {
        Ok(handle) => {
            driver
                .remote()
                .element_displayed(session.id(), handle.element_id())
                .await
        }
        Err(Error::NotFound { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Scroll `container` until `target` is displayed
///
/// Stops early once the page source no longer changes between scrolls,
/// which means the content cannot move any further.
#[allow(clippy::too_many_arguments)]
async fn scroll_until_visible(
    driver: &Driver,
    session: &Session,
    container: &Locator,
    target: &Locator,
    direction: Direction,
    amplitude: u32,
    max_scrolls: u32,
    timeout: Option<Duration>,
) -> Result<()> {
    let start = Instant::now();
    let mut source = driver.remote().page_source(session.id()).await?;

    for scrolls in 0..=max_scrolls {
        if is_visible(driver, session, target).await? {
            tracing::debug!("{} visible after {} scroll(s)", target, scrolls);
            return Ok(());
        }
        if scrolls == max_scrolls {
            break;
        }

        act(
            driver,
            session,
            container,
            timeout,
            Action::Scroll { direction, amplitude },
        )
        .await?;

        let next = driver.remote().page_source(session.id()).await?;
        if next == source {
            tracing::debug!("{} stopped moving after {} scroll(s)", container, scrolls + 1);
            if is_visible(driver, session, target).await? {
                return Ok(());
            }
            break;
        }
        source = next;
    }

    Err(Error::NotFound {
        locator: target.to_string(),
        elapsed_ms: start.elapsed().as_millis() as u64,
    })
}
