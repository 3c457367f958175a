//! Error types for the harness
//!
//! Messages are written for the person reading a CI log: each one names the
//! locator, command or value involved so the failing step can be found
//! without re-running the suite.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Connection Errors ===
    #[error("Cannot reach automation server at {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("Automation server at {endpoint} not ready after {waited_ms}ms")]
    ServerNotReady { endpoint: String, waited_ms: u64 },

    #[error("Invalid capabilities: {0}")]
    Capability(String),

    // === Session Errors ===
    #[error("No open session. Open a session before locating elements or performing actions")]
    SessionNotReady,

    #[error("Session {0} is already open. Close it before opening another")]
    SessionAlreadyOpen(String),

    // === Element Errors ===
    #[error("Element {locator} not found after {elapsed_ms}ms")]
    NotFound { locator: String, elapsed_ms: u64 },

    #[error("Element {locator} is stale: its session closed or the screen changed. Locate it again")]
    StaleElement { locator: String },

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    // === Assertion Errors ===
    #[error("{subject}: expected {expected}, got {actual}")]
    AssertionFailed {
        subject: String,
        expected: String,
        actual: String,
    },

    // === WebDriver Protocol Errors ===
    #[error("WebDriver command '{command}' failed ({error}): {message}")]
    WebDriver {
        command: String,
        error: String,
        message: String,
    },

    #[error("WebDriver protocol error: {0}")]
    Protocol(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a connection error for an endpoint
    pub fn connection(endpoint: &str, reason: impl ToString) -> Self {
        Self::Connection {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a WebDriver command failure
    pub fn webdriver(command: &str, error: &str, message: &str) -> Self {
        Self::WebDriver {
            command: command.to_string(),
            error: error.to_string(),
            message: message.to_string(),
        }
    }

    /// Create an assertion failure carrying both values
    pub fn assertion_failed(subject: &str, expected: &str, actual: &str) -> Self {
        Self::AssertionFailed {
            subject: subject.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Whether this error is an expected/actual mismatch rather than an
    /// infrastructure fault
    pub fn is_assertion(&self) -> bool {
        matches!(self, Self::AssertionFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assertion_message_contains_both_values() {
        let e = Error::assertion_failed("~switch-text", "\"ON\"", "\"OFF\"");
        let msg = e.to_string();
        assert!(msg.contains("\"ON\""));
        assert!(msg.contains("\"OFF\""));
        assert!(e.is_assertion());
    }

    #[test]
    fn test_infrastructure_errors_are_not_assertions() {
        let e = Error::NotFound {
            locator: "~endscreen".to_string(),
            elapsed_ms: 1000,
        };
        assert!(!e.is_assertion());
        assert!(!Error::SessionNotReady.is_assertion());
    }
}
