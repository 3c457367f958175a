//! Configuration file handling

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Automation server endpoint
    #[serde(default)]
    pub server: ServerConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Gesture synthesis settings
    #[serde(default)]
    pub gestures: GestureConfig,

    /// Named device/app targets that suites can refer to
    #[serde(default)]
    pub targets: HashMap<String, TargetConfig>,
}

/// Mobile platform of the device under test
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(alias = "iOS", alias = "IOS")]
    Ios,
    #[serde(alias = "Android")]
    Android,
}

impl Platform {
    /// Value of the W3C `platformName` capability
    pub fn platform_name(self) -> &'static str {
        match self {
            Self::Ios => "iOS",
            Self::Android => "Android",
        }
    }

    /// Appium automation engine used when the target doesn't name one
    pub fn default_automation_name(self) -> &'static str {
        match self {
            Self::Ios => "XCUITest",
            Self::Android => "UiAutomator2",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.platform_name())
    }
}

/// How scrolls and swipes are dispatched to the device
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GestureMode {
    /// Native primitive where the platform has one, touch sequence otherwise
    #[default]
    Auto,
    /// Always synthesise touch-point sequences
    Touch,
    /// Always use the platform's native scroll primitive
    Native,
}

/// Automation server endpoint
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Base path of the WebDriver routes (`/wd/hub` for Appium 1, `/` for Appium 2)
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_path: default_base_path(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    4723
}
fn default_base_path() -> String {
    "/wd/hub".to_string()
}

/// A device/app target
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub platform: Platform,

    /// Capabilities sent on session creation; vendor keys without a prefix
    /// get `appium:` added
    #[serde(default)]
    pub capabilities: Map<String, Value>,

    #[serde(default)]
    pub gesture_mode: GestureMode,

    /// Endpoint override for this target
    #[serde(default)]
    pub server: Option<ServerConfig>,
}

/// Timeout settings in milliseconds unless noted
#[derive(Debug, Clone, Deserialize)]
pub struct Timeouts {
    /// Default element lookup timeout
    #[serde(default = "default_find")]
    pub find_ms: u64,

    /// Interval between element lookups while waiting
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// How long to wait for the server to report ready before a suite
    #[serde(default = "default_readiness")]
    pub readiness_ms: u64,

    /// Timeout for a single HTTP request to the server
    #[serde(default = "default_request")]
    pub request_secs: u64,

    /// Pause before closing each session
    #[serde(default)]
    pub teardown_pause_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            find_ms: default_find(),
            poll_interval_ms: default_poll_interval(),
            readiness_ms: default_readiness(),
            request_secs: default_request(),
            teardown_pause_ms: 0,
        }
    }
}

fn default_find() -> u64 {
    5_000
}
fn default_poll_interval() -> u64 {
    250
}
fn default_readiness() -> u64 {
    10_000
}
fn default_request() -> u64 {
    60
}

/// Gesture synthesis settings
#[derive(Debug, Clone, Deserialize)]
pub struct GestureConfig {
    /// Hold between press and move in synthesised swipes
    #[serde(default = "default_hold")]
    pub hold_ms: u64,

    /// Scroll distance in pixels when a step gives none
    #[serde(default = "default_amplitude")]
    pub default_amplitude: u32,

    /// Upper bound for `scroll_until_visible`
    #[serde(default = "default_max_scrolls")]
    pub max_scrolls: u32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            hold_ms: default_hold(),
            default_amplitude: default_amplitude(),
            max_scrolls: default_max_scrolls(),
        }
    }
}

fn default_hold() -> u64 {
    1_000
}
fn default_amplitude() -> u32 {
    1_500
}
fn default_max_scrolls() -> u32 {
    10
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Get a named target
    pub fn get_target(&self, name: &str) -> Result<TargetConfig> {
        self.targets.get(name).cloned().ok_or_else(|| {
            let mut known: Vec<&str> = self.targets.keys().map(String::as_str).collect();
            known.sort_unstable();
            Error::Config(format!(
                "Unknown target '{}'. Configured targets: [{}]",
                name,
                known.join(", ")
            ))
        })
    }
}
