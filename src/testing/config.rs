//! Suite file types
//!
//! Defines the data structures for deserializing YAML test suites.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::common::config::{Config, TargetConfig};
use crate::common::{Error, Result};
use crate::driver::action::validate_gesture;
use crate::driver::{Direction, GesturePoint, Locator, Matcher, SessionConfig};

/// A test suite loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct Suite {
    /// Name of the suite
    pub name: String,
    /// Optional description of what the suite covers
    pub description: Option<String>,
    /// Device/app to run against
    pub target: TargetRef,
    /// Steps run at the start of every scenario, in its session
    #[serde(default)]
    pub before_each: Vec<Step>,
    /// Scenarios, run in order
    pub scenarios: Vec<Scenario>,
}

/// A target given by profile name or inline
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum TargetRef {
    Named(String),
    Inline(TargetConfig),
}

impl std::fmt::Display for TargetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{}", name),
            Self::Inline(target) => write!(f, "inline {} target", target.platform),
        }
    }
}

/// One scenario; gets a fresh session
#[derive(Deserialize, Debug)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<Step>,
}

/// A single step in a scenario
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Replace the text of an input
    SetValue {
        locator: Locator,
        text: String,
        timeout_ms: Option<u64>,
    },
    /// Tap an element
    Tap {
        locator: Locator,
        timeout_ms: Option<u64>,
    },
    /// Replay touch points, on an element or on the screen
    Gesture {
        locator: Option<Locator>,
        points: Vec<GesturePoint>,
        timeout_ms: Option<u64>,
    },
    /// Scroll an element's content once
    Scroll {
        locator: Locator,
        direction: Direction,
        /// Pixels; defaults to `gestures.default_amplitude`
        amplitude: Option<u32>,
        timeout_ms: Option<u64>,
    },
    /// Scroll `locator` until `target` is displayed
    ScrollUntilVisible {
        locator: Locator,
        target: Locator,
        #[serde(default = "default_direction")]
        direction: Direction,
        amplitude: Option<u32>,
        /// Defaults to `gestures.max_scrolls`
        max_scrolls: Option<u32>,
        timeout_ms: Option<u64>,
    },
    /// Wait for an element to exist
    WaitFor {
        locator: Locator,
        timeout_ms: Option<u64>,
    },
    /// Check an element; exactly one of `equals`, `contains`, `visible`
    Assert {
        locator: Locator,
        equals: Option<String>,
        contains: Option<String>,
        visible: Option<bool>,
        timeout_ms: Option<u64>,
    },
    /// Sleep
    Pause { ms: u64 },
}

fn default_direction() -> Direction {
    Direction::Down
}

impl Step {
    /// Per-step lookup timeout, if set
    pub fn timeout(&self) -> Option<Duration> {
        let ms = match self {
            Self::SetValue { timeout_ms, .. }
            | Self::Tap { timeout_ms, .. }
            | Self::Gesture { timeout_ms, .. }
            | Self::Scroll { timeout_ms, .. }
            | Self::ScrollUntilVisible { timeout_ms, .. }
            | Self::WaitFor { timeout_ms, .. }
            | Self::Assert { timeout_ms, .. } => *timeout_ms,
            Self::Pause { .. } => None,
        };
        ms.map(Duration::from_millis)
    }

    /// Matcher of an `assert` step
    pub fn matcher(&self) -> Result<Matcher> {
        let Self::Assert {
            equals,
            contains,
            visible,
            ..
        } = self
        else {
            return Err(Error::Config(format!("'{}' is not an assertion", self)));
        };

        match (equals, contains, visible) {
            (Some(s), None, None) => Ok(Matcher::Equals(s.clone())),
            (None, Some(s), None) => Ok(Matcher::Contains(s.clone())),
            (None, None, Some(v)) => Ok(Matcher::Visible(*v)),
            _ => Err(Error::Config(format!(
                "'{}' needs exactly one of equals, contains, visible",
                self
            ))),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Assert { .. } => self.matcher().map(|_| ()),
            Self::Gesture {
                locator, points, ..
            } => validate_gesture(points, locator.is_some())
                .map_err(|e| Error::Config(format!("'{}': {}", self, e))),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetValue { locator, text, .. } => write!(f, "set_value {} = {:?}", locator, text),
            Self::Tap { locator, .. } => write!(f, "tap {}", locator),
            Self::Gesture {
                locator, points, ..
            } => match locator {
                Some(l) => write!(f, "gesture on {} ({} points)", l, points.len()),
                None => write!(f, "gesture ({} points)", points.len()),
            },
            Self::Scroll {
                locator, direction, ..
            } => write!(f, "scroll {} {}", locator, direction),
            Self::ScrollUntilVisible {
                locator,
                target,
                direction,
                ..
            } => write!(f, "scroll {} {} until {} is visible", locator, direction, target),
            Self::WaitFor { locator, .. } => write!(f, "wait_for {}", locator),
            Self::Assert {
                locator,
                equals,
                contains,
                visible,
                ..
            } => {
                write!(f, "assert {}", locator)?;
                if let Some(s) = equals {
                    write!(f, " equals {:?}", s)?;
                }
                if let Some(s) = contains {
                    write!(f, " contains {:?}", s)?;
                }
                if let Some(v) = visible {
                    write!(f, " visible={}", v)?;
                }
                Ok(())
            }
            Self::Pause { ms } => write!(f, "pause {}ms", ms),
        }
    }
}

impl Suite {
    /// Load and validate a suite file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            Error::ConfigParse(msg) => Error::ConfigParse(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parse and validate suite YAML
    pub fn parse(content: &str) -> Result<Self> {
        let suite: Self =
            serde_yaml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))?;
        suite.validate()?;
        Ok(suite)
    }

    /// Check everything that can be checked without a device
    pub fn validate(&self) -> Result<()> {
        if self.scenarios.is_empty() {
            return Err(Error::Config(format!(
                "suite '{}' has no scenarios",
                self.name
            )));
        }

        for step in &self.before_each {
            step.validate()
                .map_err(|e| Error::Config(format!("before_each: {}", e)))?;
        }

        let mut seen = std::collections::HashSet::new();
        for scenario in &self.scenarios {
            if !seen.insert(scenario.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate scenario name '{}'",
                    scenario.name
                )));
            }
            if scenario.steps.is_empty() && self.before_each.is_empty() {
                return Err(Error::Config(format!(
                    "scenario '{}' has no steps",
                    scenario.name
                )));
            }
            for (i, step) in scenario.steps.iter().enumerate() {
                step.validate().map_err(|e| {
                    Error::Config(format!("scenario '{}' step {}: {}", scenario.name, i + 1, e))
                })?;
            }
        }
        Ok(())
    }

    /// Resolve the target against the configured profiles
    pub fn resolve_target(&self, config: &Config) -> Result<TargetConfig> {
        match &self.target {
            TargetRef::Named(name) => config.get_target(name),
            TargetRef::Inline(target) => Ok(target.clone()),
        }
    }

    /// Session settings for this suite's target
    pub fn session_config(&self, config: &Config) -> Result<SessionConfig> {
        let target = self.resolve_target(config)?;
        Ok(SessionConfig::from_target(&config.server, &target))
    }
}
