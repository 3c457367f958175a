//! Element lookup
//!
//! Locators are resolved against the live UI tree on every call. Handles
//! are not cached: re-find after anything that may have changed the screen.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

use crate::common::config::Platform;
use crate::common::{Error, Result};
use crate::webdriver::{Remote, WireLocator};

use super::session::Session;

/// How to find a UI element
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "LocatorSpec")]
pub enum Locator {
    /// Accessibility identifier/label (`~id`)
    AccessibilityId(String),
    /// Visible text (`text=...`)
    Text(String),
    /// Test id set by the app (`testid=...`)
    TestId(String),
}

/// Suite files may write a locator as shorthand or as a one-key map
#[derive(Deserialize)]
#[serde(untagged)]
enum LocatorSpec {
    Short(String),
    Tagged(TaggedLocator),
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum TaggedLocator {
    AccessibilityId(String),
    Text(String),
    TestId(String),
}

impl TryFrom<LocatorSpec> for Locator {
    type Error = Error;

    fn try_from(spec: LocatorSpec) -> Result<Self> {
        match spec {
            LocatorSpec::Short(s) => s.parse(),
            LocatorSpec::Tagged(TaggedLocator::AccessibilityId(s)) => Ok(Self::AccessibilityId(s)),
            LocatorSpec::Tagged(TaggedLocator::Text(s)) => Ok(Self::Text(s)),
            LocatorSpec::Tagged(TaggedLocator::TestId(s)) => Ok(Self::TestId(s)),
        }
    }
}

impl FromStr for Locator {
    type Err = Error;

    /// Parse `~id`, `text=...` or `testid=...`
    fn from_str(s: &str) -> Result<Self> {
        let locator = if let Some(id) = s.strip_prefix('~') {
            Self::AccessibilityId(id.to_string())
        } else if let Some(text) = s.strip_prefix("text=") {
            Self::Text(text.to_string())
        } else if let Some(id) = s.strip_prefix("testid=") {
            Self::TestId(id.to_string())
        } else {
            return Err(Error::Config(format!(
                "Invalid locator '{}'. Use '~<accessibility id>', 'text=<text>' or 'testid=<id>'",
                s
            )));
        };

        if locator.key().is_empty() {
            return Err(Error::Config(format!("Empty locator '{}'", s)));
        }
        Ok(locator)
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccessibilityId(id) => write!(f, "~{}", id),
            Self::Text(text) => write!(f, "text={}", text),
            Self::TestId(id) => write!(f, "testid={}", id),
        }
    }
}

impl Locator {
    /// The opaque key chosen by the app
    pub fn key(&self) -> &str {
        match self {
            Self::AccessibilityId(s) | Self::Text(s) | Self::TestId(s) => s,
        }
    }

    /// Locator strategy and selector for the given platform
    ///
    /// React Native maps `testID` to the accessibility identifier on iOS and
    /// to the resource id on Android, so test ids resolve differently.
    pub fn to_wire(&self, platform: Platform) -> WireLocator {
        match (self, platform) {
            (Self::AccessibilityId(id), _) => WireLocator::new("accessibility id", id.as_str()),
            (Self::Text(text), Platform::Ios) => WireLocator::new(
                "-ios predicate string",
                format!(
                    "label == \"{0}\" OR value == \"{0}\"",
                    escape_quotes(text)
                ),
            ),
            (Self::Text(text), Platform::Android) => WireLocator::new(
                "-android uiautomator",
                format!("new UiSelector().text(\"{}\")", escape_quotes(text)),
            ),
            (Self::TestId(id), Platform::Ios) => WireLocator::new("accessibility id", id.as_str()),
            (Self::TestId(id), Platform::Android) => WireLocator::new("id", id.as_str()),
        }
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// A resolved element, valid only while its session stays open
#[derive(Debug, Clone)]
pub struct ElementHandle {
    session_id: String,
    element_id: String,
    locator: Locator,
    resolved_at: Instant,
}

impl ElementHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Time since the element was resolved
    pub fn age(&self) -> Duration {
        self.resolved_at.elapsed()
    }

    /// Fail unless `session` is the open session this handle came from
    pub fn ensure_usable(&self, session: &Session) -> Result<()> {
        if session.is_open() && session.id() == self.session_id {
            Ok(())
        } else {
            tracing::debug!(
                "{} resolved {}ms ago in session {} is stale",
                self.locator,
                self.age().as_millis(),
                self.session_id
            );
            Err(Error::StaleElement {
                locator: self.locator.to_string(),
            })
        }
    }
}

/// Resolves locators by polling the remote UI tree
pub struct ElementFinder {
    remote: Arc<dyn Remote>,
    default_timeout: Duration,
    poll_interval: Duration,
}

impl ElementFinder {
    pub fn new(remote: Arc<dyn Remote>, default_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            remote,
            default_timeout,
            poll_interval,
        }
    }

    /// Find an element, polling until it appears or `timeout` elapses
    ///
    /// The lookup is always attempted at least once, so a zero timeout means
    /// "present right now".
    pub async fn find(
        &self,
        session: &Session,
        locator: &Locator,
        timeout: Option<Duration>,
    ) -> Result<ElementHandle> {
        session.ensure_open()?;

        let timeout = timeout.unwrap_or(self.default_timeout);
        let wire = locator.to_wire(session.platform());
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if let Some(element_id) = self.remote.find_element(session.id(), &wire).await? {
                tracing::debug!(
                    "Found {} as {} after {} attempt(s)",
                    locator,
                    element_id,
                    attempts
                );
                return Ok(ElementHandle {
                    session_id: session.id().to_string(),
                    element_id,
                    locator: locator.clone(),
                    resolved_at: Instant::now(),
                });
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(Error::NotFound {
                    locator: locator.to_string(),
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }

    /// Wait until an element exists
    pub async fn wait_for_exist(
        &self,
        session: &Session,
        locator: &Locator,
        timeout: Option<Duration>,
    ) -> Result<()> {
        self.find(session, locator, timeout).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::{GestureMode, ServerConfig};
    use crate::driver::session::{SessionConfig, SessionManager};
    use crate::fixture::FixtureApp;
    use serde_json::json;

    async fn open(app: &Arc<FixtureApp>) -> (SessionManager, Session) {
        let mut manager = SessionManager::new(app.clone());
        let session = manager
            .open(SessionConfig {
                server: ServerConfig::default(),
                platform: Platform::Ios,
                capabilities: json!({ "app": "demo.app" }).as_object().cloned().unwrap(),
                gesture_mode: GestureMode::Auto,
            })
            .await
            .unwrap();
        (manager, session)
    }

    fn finder(app: &Arc<FixtureApp>) -> ElementFinder {
        ElementFinder::new(
            app.clone(),
            Duration::from_millis(100),
            Duration::from_millis(10),
        )
    }

    #[test]
    fn test_parse_shorthand() {
        assert_eq!(
            "~username-textinput".parse::<Locator>().unwrap(),
            Locator::AccessibilityId("username-textinput".to_string())
        );
        assert_eq!(
            "text=Top Manga".parse::<Locator>().unwrap(),
            Locator::Text("Top Manga".to_string())
        );
        assert_eq!(
            "testid=user".parse::<Locator>().unwrap(),
            Locator::TestId("user".to_string())
        );
        assert!("username".parse::<Locator>().is_err());
        assert!("~".parse::<Locator>().is_err());
    }

    #[test]
    fn test_display_round_trips_shorthand() {
        for s in ["~switch", "text=End of screen", "testid=loading"] {
            assert_eq!(s.parse::<Locator>().unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_deserialize_both_forms() {
        let short: Locator = serde_yaml::from_str("\"~switch\"").unwrap();
        assert_eq!(short, Locator::AccessibilityId("switch".to_string()));

        let tagged: Locator = serde_yaml::from_str("text: Login").unwrap();
        assert_eq!(tagged, Locator::Text("Login".to_string()));

        assert!(serde_yaml::from_str::<Locator>("xpath: //a").is_err());
    }

    #[test]
    fn test_wire_mapping_per_platform() {
        let text = Locator::Text("Say \"hi\"".to_string());
        assert_eq!(
            text.to_wire(Platform::Ios),
            WireLocator::new(
                "-ios predicate string",
                "label == \"Say \\\"hi\\\"\" OR value == \"Say \\\"hi\\\"\""
            )
        );
        assert_eq!(
            text.to_wire(Platform::Android).using,
            "-android uiautomator"
        );

        let test_id = Locator::TestId("user".to_string());
        assert_eq!(test_id.to_wire(Platform::Ios).using, "accessibility id");
        assert_eq!(test_id.to_wire(Platform::Android), WireLocator::new("id", "user"));
    }

    #[tokio::test]
    async fn test_find_present_element() {
        let app = Arc::new(FixtureApp::new());
        let (_manager, session) = open(&app).await;

        let handle = finder(&app)
            .find(&session, &"~username-textinput".parse().unwrap(), None)
            .await
            .unwrap();
        assert_eq!(handle.session_id(), session.id());
        handle.ensure_usable(&session).unwrap();
    }

    #[tokio::test]
    async fn test_find_by_text() {
        let app = Arc::new(FixtureApp::new());
        let (_manager, session) = open(&app).await;

        finder(&app)
            .find(&session, &Locator::Text("Login".to_string()), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_element_times_out() {
        let app = Arc::new(FixtureApp::new());
        let (_manager, session) = open(&app).await;

        let start = std::time::Instant::now();
        let err = finder(&app)
            .find(
                &session,
                &"~endscreen".parse().unwrap(),
                Some(Duration::from_millis(50)),
            )
            .await
            .unwrap_err();

        match err {
            Error::NotFound { locator, elapsed_ms } => {
                assert_eq!(locator, "~endscreen");
                assert!(elapsed_ms >= 50);
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
        assert!(start.elapsed() >= Duration::from_millis(50));
        // Polled more than once
        assert!(app.find_calls() > 1);
    }

    #[tokio::test]
    async fn test_find_requires_open_session() {
        let app = Arc::new(FixtureApp::new());
        let (mut manager, mut session) = open(&app).await;
        manager.close(&mut session).await.unwrap();

        let err = finder(&app)
            .find(&session, &"~switch".parse().unwrap(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotReady));
    }

    #[tokio::test]
    async fn test_handle_stale_after_close() {
        let app = Arc::new(FixtureApp::new());
        let (mut manager, mut session) = open(&app).await;
        let handle = finder(&app)
            .find(&session, &"~login-button".parse().unwrap(), None)
            .await
            .unwrap();

        manager.close(&mut session).await.unwrap();
        let err = handle.ensure_usable(&session).unwrap_err();
        assert!(matches!(err, Error::StaleElement { .. }));
    }
}
