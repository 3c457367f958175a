//! e2e-harness - end-to-end tests for mobile apps
//!
//! Drives an app on a device or simulator through an Appium-compatible
//! WebDriver server: opens a session per scenario, locates elements, performs
//! taps, text input and gestures, and checks what the app shows.

pub mod cli;
pub mod commands;
pub mod common;
pub mod driver;
pub mod fixture;
pub mod testing;
pub mod webdriver;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use driver::{Driver, Locator, Session, SessionConfig};
pub use testing::{Outcome, Suite, SuiteReport};
