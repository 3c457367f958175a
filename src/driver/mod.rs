//! Session driver
//!
//! Session lifecycle, element lookup, actions and assertions on top of a
//! [`Remote`]. [`Driver`] bundles them with settings from [`Config`].

pub mod action;
pub mod assertion;
pub mod gesture;
pub mod locator;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use crate::common::config::Config;
use crate::common::Result;
use crate::webdriver::Remote;

pub use action::{Action, ActionExecutor, Direction, GestureKind, GesturePoint};
pub use assertion::{Assertion, Matcher, Observed};
pub use locator::{ElementFinder, ElementHandle, Locator};
pub use session::{Session, SessionConfig, SessionManager, SessionStatus};

/// Everything a scenario needs to talk to one remote endpoint
pub struct Driver {
    pub sessions: SessionManager,
    pub finder: ElementFinder,
    pub actions: ActionExecutor,
    remote: Arc<dyn Remote>,
    poll_interval: Duration,
}

impl Driver {
    pub fn new(remote: Arc<dyn Remote>, config: &Config) -> Self {
        let poll_interval = Duration::from_millis(config.timeouts.poll_interval_ms);
        Self {
            sessions: SessionManager::new(remote.clone()),
            finder: ElementFinder::new(
                remote.clone(),
                Duration::from_millis(config.timeouts.find_ms),
                poll_interval,
            ),
            actions: ActionExecutor::new(remote.clone(), config.gestures.hold_ms),
            remote,
            poll_interval,
        }
    }

    pub fn remote(&self) -> &dyn Remote {
        self.remote.as_ref()
    }

    /// Wait for the server to report ready
    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        self.sessions.wait_ready(timeout, self.poll_interval).await
    }

    /// Locate an element and check it
    pub async fn assert(
        &self,
        session: &Session,
        locator: &Locator,
        matcher: Matcher,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let handle = self.finder.find(session, locator, timeout).await?;
        Assertion::new(locator.to_string(), matcher)
            .verify(self.remote(), session, &handle)
            .await
    }

    /// Locate an element and read its text
    pub async fn text(&self, session: &Session, locator: &Locator, timeout: Option<Duration>) -> Result<String> {
        let handle = self.finder.find(session, locator, timeout).await?;
        handle.ensure_usable(session)?;
        self.remote.element_text(session.id(), handle.element_id()).await
    }
}
