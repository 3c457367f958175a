//! Remote automation endpoint
//!
//! The [`Remote`] trait names the operations the harness needs from an
//! automation server; [`WebDriverClient`] implements it for Appium and other
//! W3C WebDriver servers.

pub mod client;
pub mod remote;
pub mod types;

pub use client::WebDriverClient;
pub use remote::Remote;
pub use types::{Rect, WireLocator};
