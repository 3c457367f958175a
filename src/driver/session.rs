//! Session lifecycle
//!
//! A [`Session`] is created by [`SessionManager::open`] and must be handed
//! back to [`SessionManager::close`] on every exit path. The manager tracks
//! the one session it allows to be open at a time.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::Instant;

use crate::common::config::{GestureMode, Platform, ServerConfig, TargetConfig};
use crate::common::{Error, Result};
use crate::webdriver::types::W3C_CAPABILITIES;
use crate::webdriver::Remote;

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Closed,
    Open,
    Closing,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
        }
    }
}

/// Everything needed to open a session against one device/app
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub server: ServerConfig,
    pub platform: Platform,
    pub capabilities: Map<String, Value>,
    pub gesture_mode: GestureMode,
}

impl SessionConfig {
    /// Build from a target, using `default_server` unless the target overrides it
    pub fn from_target(default_server: &ServerConfig, target: &TargetConfig) -> Self {
        Self {
            server: target
                .server
                .clone()
                .unwrap_or_else(|| default_server.clone()),
            platform: target.platform,
            capabilities: target.capabilities.clone(),
            gesture_mode: target.gesture_mode,
        }
    }

    /// Capabilities as sent on the wire
    ///
    /// Adds `platformName` and a default `appium:automationName`, prefixes
    /// vendor keys with `appium:`, and rejects sets Appium would refuse.
    pub fn w3c_capabilities(&self) -> Result<Map<String, Value>> {
        let mut caps = Map::new();

        for (key, value) in &self.capabilities {
            let key = if key.contains(':') || W3C_CAPABILITIES.contains(&key.as_str()) {
                key.clone()
            } else {
                format!("appium:{}", key)
            };
            if caps.insert(key.clone(), value.clone()).is_some() {
                return Err(Error::Capability(format!(
                    "'{}' given both with and without the 'appium:' prefix",
                    key
                )));
            }
        }

        match caps.get("platformName") {
            Some(Value::String(name)) => {
                if !name.eq_ignore_ascii_case(self.platform.platform_name()) {
                    return Err(Error::Capability(format!(
                        "platformName '{}' does not match target platform {}",
                        name, self.platform
                    )));
                }
            }
            Some(other) => {
                return Err(Error::Capability(format!(
                    "platformName must be a string, got {}",
                    other
                )));
            }
            None => {
                caps.insert(
                    "platformName".to_string(),
                    Value::from(self.platform.platform_name()),
                );
            }
        }

        caps.entry("appium:automationName")
            .or_insert_with(|| Value::from(self.platform.default_automation_name()));

        if let Some(options) = caps.get("appium:options") {
            if !options.is_object() {
                return Err(Error::Capability(
                    "appium:options must be a map".to_string(),
                ));
            }
        }

        let app_keys: &[&str] = match self.platform {
            Platform::Ios => &["appium:app", "appium:bundleId", "browserName"],
            Platform::Android => &["appium:app", "appium:appPackage", "browserName"],
        };
        if !app_keys.iter().any(|k| caps.contains_key(*k)) {
            return Err(Error::Capability(format!(
                "no app identifier for {}: set one of {}",
                self.platform,
                app_keys
                    .iter()
                    .map(|k| k.trim_start_matches("appium:"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        Ok(caps)
    }
}

/// A remote automation session
#[derive(Debug)]
pub struct Session {
    id: String,
    config: Arc<SessionConfig>,
    status: SessionStatus,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn platform(&self) -> Platform {
        self.config.platform
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    /// Fail fast unless the session is open
    pub fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::SessionNotReady)
        }
    }
}

/// Opens and closes sessions against one remote endpoint
pub struct SessionManager {
    remote: Arc<dyn Remote>,
    /// Id of the currently open session
    active: Option<String>,
}

impl SessionManager {
    pub fn new(remote: Arc<dyn Remote>) -> Self {
        Self {
            remote,
            active: None,
        }
    }

    pub fn remote(&self) -> &Arc<dyn Remote> {
        &self.remote
    }

    /// Id of the open session, if any
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Poll the server status until it reports ready
    ///
    /// Connection errors count as "not ready yet" until the deadline.
    pub async fn wait_ready(&self, timeout: Duration, poll_interval: Duration) -> Result<()> {
        let start = Instant::now();
        loop {
            match self.remote.status().await {
                Ok(true) => {
                    tracing::debug!(
                        "Server {} ready after {}ms",
                        self.remote.endpoint(),
                        start.elapsed().as_millis()
                    );
                    return Ok(());
                }
                Ok(false) => tracing::debug!("Server {} not ready yet", self.remote.endpoint()),
                Err(e) => tracing::debug!("Server status check failed: {}", e),
            }

            if start.elapsed() >= timeout {
                return Err(Error::ServerNotReady {
                    endpoint: self.remote.endpoint(),
                    waited_ms: start.elapsed().as_millis() as u64,
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Open a session
    ///
    /// Capabilities are validated before anything goes over the wire. A
    /// single creation attempt is made.
    pub async fn open(&mut self, config: SessionConfig) -> Result<Session> {
        if let Some(id) = &self.active {
            return Err(Error::SessionAlreadyOpen(id.clone()));
        }

        let capabilities = config.w3c_capabilities()?;
        tracing::debug!("Opening {} session with {:?}", config.platform, capabilities);

        let id = self.remote.new_session(&capabilities).await?;
        tracing::info!("Session {} opened on {}", id, self.remote.endpoint());

        self.active = Some(id.clone());
        Ok(Session {
            id,
            config: Arc::new(config),
            status: SessionStatus::Open,
        })
    }

    /// Close a session
    ///
    /// Calling this on a closed session is a no-op. The session ends up
    /// Closed even when the server fails to delete it; that failure is
    /// returned.
    pub async fn close(&mut self, session: &mut Session) -> Result<()> {
        if session.status != SessionStatus::Open {
            return Ok(());
        }

        session.status = SessionStatus::Closing;
        let result = self.remote.delete_session(&session.id).await;
        session.status = SessionStatus::Closed;
        if self.active.as_deref() == Some(session.id.as_str()) {
            self.active = None;
        }

        match &result {
            Ok(()) => tracing::info!("Session {} closed", session.id),
            Err(e) => tracing::warn!("Session {} delete failed: {}", session.id, e),
        }
        result
    }
}
