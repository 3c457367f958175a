//! The remote automation endpoint as seen by the harness
//!
//! Everything above this trait is protocol-agnostic. [`WebDriverClient`]
//! implements it over HTTP; the in-memory fixture app implements it for
//! tests and dry runs.
//!
//! [`WebDriverClient`]: super::WebDriverClient

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::common::Result;
use crate::driver::action::GesturePoint;

use super::types::{Rect, WireLocator};

/// Operations a remote automation endpoint must support
#[async_trait]
pub trait Remote: Send + Sync {
    /// Human-readable endpoint, used in diagnostics
    fn endpoint(&self) -> String;

    /// Whether the server is ready to create sessions
    async fn status(&self) -> Result<bool>;

    /// Create a session, returning its id
    async fn new_session(&self, capabilities: &Map<String, Value>) -> Result<String>;

    async fn delete_session(&self, session_id: &str) -> Result<()>;

    /// Look up one element; `Ok(None)` when nothing matches right now
    async fn find_element(&self, session_id: &str, locator: &WireLocator)
        -> Result<Option<String>>;

    async fn element_text(&self, session_id: &str, element_id: &str) -> Result<String>;

    /// Replace the element's value with `text`
    async fn set_value(&self, session_id: &str, element_id: &str, text: &str) -> Result<()>;

    async fn click(&self, session_id: &str, element_id: &str) -> Result<()>;

    async fn element_displayed(&self, session_id: &str, element_id: &str) -> Result<bool>;

    async fn element_rect(&self, session_id: &str, element_id: &str) -> Result<Rect>;

    /// Dispatch a touch gesture, points in order
    async fn perform_touch(
        &self,
        session_id: &str,
        element_id: Option<&str>,
        points: &[GesturePoint],
    ) -> Result<()>;

    /// Run an Appium `mobile:` command such as `mobile: scroll`
    async fn execute_mobile(&self, session_id: &str, command: &str, args: Value) -> Result<Value>;

    /// Serialized UI tree, used to detect whether a scroll changed anything
    async fn page_source(&self, session_id: &str) -> Result<String>;
}
