//! Action vocabulary and executor
//!
//! Every action checks its element handle against the session first, so a
//! handle from a closed session fails with `StaleElement` before anything
//! reaches the server.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::common::{Error, Result};
use crate::webdriver::Remote;

use super::gesture::{strategy_for, GestureStrategy};
use super::locator::ElementHandle;
use super::session::Session;

/// Touch primitive kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    Press,
    Wait,
    #[serde(alias = "moveTo")]
    MoveTo,
    Release,
}

/// One step of a touch gesture
///
/// Coordinates are viewport pixels and may fall outside the screen, which
/// is how long swipes are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GesturePoint {
    pub kind: GestureKind,
    #[serde(default)]
    pub x: Option<i64>,
    #[serde(default)]
    pub y: Option<i64>,
    #[serde(default, alias = "ms")]
    pub duration_ms: Option<u64>,
}

impl GesturePoint {
    pub fn press(x: i64, y: i64) -> Self {
        Self {
            kind: GestureKind::Press,
            x: Some(x),
            y: Some(y),
            duration_ms: None,
        }
    }

    /// Press on the centre of the gesture's element
    pub fn press_element() -> Self {
        Self {
            kind: GestureKind::Press,
            x: None,
            y: None,
            duration_ms: None,
        }
    }

    pub fn wait(ms: u64) -> Self {
        Self {
            kind: GestureKind::Wait,
            x: None,
            y: None,
            duration_ms: Some(ms),
        }
    }

    pub fn move_to(x: i64, y: i64) -> Self {
        Self {
            kind: GestureKind::MoveTo,
            x: Some(x),
            y: Some(y),
            duration_ms: None,
        }
    }

    pub fn release() -> Self {
        Self {
            kind: GestureKind::Release,
            x: None,
            y: None,
            duration_ms: None,
        }
    }
}

/// Check a gesture is well formed
///
/// A gesture must start with a press, end with a release, and every move
/// needs both coordinates. A press may omit coordinates only when it targets
/// an element.
pub fn validate_gesture(points: &[GesturePoint], has_element: bool) -> Result<()> {
    let first = points
        .first()
        .ok_or_else(|| Error::InvalidAction("gesture has no points".to_string()))?;
    if first.kind != GestureKind::Press {
        return Err(Error::InvalidAction(
            "gesture must start with a press".to_string(),
        ));
    }
    if points.last().map(|p| p.kind) != Some(GestureKind::Release) {
        return Err(Error::InvalidAction(
            "gesture must end with a release".to_string(),
        ));
    }

    for (i, point) in points.iter().enumerate() {
        let has_xy = point.x.is_some() && point.y.is_some();
        match point.kind {
            GestureKind::MoveTo if !has_xy => {
                return Err(Error::InvalidAction(format!(
                    "point {}: move_to needs x and y",
                    i + 1
                )));
            }
            GestureKind::Press if !has_xy && !has_element => {
                return Err(Error::InvalidAction(format!(
                    "point {}: press needs x and y when no element is given",
                    i + 1
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Scroll direction: the way the content moves into view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Name used by Appium `mobile:` commands
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed action against one element
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetValue(String),
    Tap,
    Gesture(Vec<GesturePoint>),
    Scroll { direction: Direction, amplitude: u32 },
}

/// Performs actions; holds configuration only
pub struct ActionExecutor {
    remote: Arc<dyn Remote>,
    hold_ms: u64,
}

impl ActionExecutor {
    pub fn new(remote: Arc<dyn Remote>, hold_ms: u64) -> Self {
        Self { remote, hold_ms }
    }

    fn strategy(&self, session: &Session) -> Box<dyn GestureStrategy> {
        strategy_for(
            session.platform(),
            session.config().gesture_mode,
            self.hold_ms,
        )
    }

    /// Dispatch an [`Action`] value
    pub async fn execute(
        &self,
        session: &Session,
        handle: &ElementHandle,
        action: &Action,
    ) -> Result<()> {
        match action {
            Action::SetValue(text) => self.set_value(session, handle, text).await,
            Action::Tap => self.tap(session, handle).await,
            Action::Gesture(points) => self.gesture(session, Some(handle), points).await,
            Action::Scroll {
                direction,
                amplitude,
            } => self.scroll(session, handle, *direction, *amplitude).await,
        }
    }

    pub async fn set_value(&self, session: &Session, handle: &ElementHandle, text: &str) -> Result<()> {
        handle.ensure_usable(session)?;
        tracing::debug!("set_value {} = {:?}", handle.locator(), text);
        self.remote
            .set_value(session.id(), handle.element_id(), text)
            .await
            .map_err(|e| stale_or(e, handle))
    }

    pub async fn tap(&self, session: &Session, handle: &ElementHandle) -> Result<()> {
        handle.ensure_usable(session)?;
        tracing::debug!("tap {}", handle.locator());
        self.remote
            .click(session.id(), handle.element_id())
            .await
            .map_err(|e| stale_or(e, handle))
    }

    /// Replay a touch gesture; without a handle it targets the screen
    pub async fn gesture(
        &self,
        session: &Session,
        handle: Option<&ElementHandle>,
        points: &[GesturePoint],
    ) -> Result<()> {
        match handle {
            Some(handle) => handle.ensure_usable(session)?,
            None => session.ensure_open()?,
        }
        validate_gesture(points, handle.is_some())?;

        let strategy = self.strategy(session);
        tracing::debug!(
            "gesture ({} points) via {} on {}",
            points.len(),
            strategy.name(),
            handle.map(|h| h.locator().to_string()).unwrap_or_else(|| "screen".to_string())
        );
        strategy
            .perform(self.remote.as_ref(), session, handle, points)
            .await
            .map_err(|e| match handle {
                Some(h) => stale_or(e, h),
                None => e,
            })
    }

    pub async fn scroll(
        &self,
        session: &Session,
        handle: &ElementHandle,
        direction: Direction,
        amplitude: u32,
    ) -> Result<()> {
        handle.ensure_usable(session)?;

        let strategy = self.strategy(session);
        tracing::debug!(
            "scroll {} {} by {}px via {}",
            handle.locator(),
            direction,
            amplitude,
            strategy.name()
        );
        strategy
            .scroll(self.remote.as_ref(), session, handle, direction, amplitude)
            .await
            .map_err(|e| stale_or(e, handle))
    }

    /// Sleep without touching the device
    pub async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Map the server's stale-element error onto ours
fn stale_or(e: Error, handle: &ElementHandle) -> Error {
    match e {
        Error::WebDriver { ref error, .. } if error == "stale element reference" => {
            Error::StaleElement {
                locator: handle.locator().to_string(),
            }
        }
        other => other,
    }
}
