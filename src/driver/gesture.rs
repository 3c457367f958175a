//! Platform gesture strategies
//!
//! Scrolls and swipes can be sent either as raw touch-point sequences or as
//! the driver's native scroll primitive (`mobile: scroll` on XCUITest,
//! `mobile: scrollGesture` on UiAutomator2). Both scroll the element the
//! same way; which one is used depends on the platform and the target's
//! [`GestureMode`].

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::common::config::{GestureMode, Platform};
use crate::common::Result;
use crate::webdriver::{Rect, Remote};

use super::action::{Direction, GesturePoint};
use super::locator::ElementHandle;
use super::session::Session;

/// A way of dispatching gestures to the device
#[async_trait]
pub trait GestureStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Replay `points` in order
    async fn perform(
        &self,
        remote: &dyn Remote,
        session: &Session,
        handle: Option<&ElementHandle>,
        points: &[GesturePoint],
    ) -> Result<()>;

    /// Scroll the element's content towards `direction`
    async fn scroll(
        &self,
        remote: &dyn Remote,
        session: &Session,
        handle: &ElementHandle,
        direction: Direction,
        amplitude: u32,
    ) -> Result<()>;
}

/// Pick the strategy for a platform
///
/// In auto mode iOS gets the native primitive and Android gets touch
/// sequences.
pub fn strategy_for(platform: Platform, mode: GestureMode, hold_ms: u64) -> Box<dyn GestureStrategy> {
    let touch = TouchSequence { hold_ms };
    match (mode, platform) {
        (GestureMode::Touch, _) | (GestureMode::Auto, Platform::Android) => Box::new(touch),
        (GestureMode::Native, _) | (GestureMode::Auto, Platform::Ios) => Box::new(NativeScroll {
            platform,
            fallback: touch,
        }),
    }
}

/// Native scroll command and arguments for a platform
///
/// UiAutomator2's `mobile: scroll` locates its container by UiSelector and
/// takes no direction, so Android uses `mobile: scrollGesture`, which
/// scrolls an element by a fraction of its size.
pub fn native_scroll_command(platform: Platform, element_id: &str, direction: Direction) -> (&'static str, Value) {
    match platform {
        Platform::Ios => (
            "mobile: scroll",
            json!({ "elementId": element_id, "direction": direction.as_str() }),
        ),
        Platform::Android => (
            "mobile: scrollGesture",
            json!({
                "elementId": element_id,
                "direction": direction.as_str(),
                "percent": NATIVE_SCROLL_PERCENT,
            }),
        ),
    }
}

/// Fraction of the element scrolled by one `mobile: scrollGesture`
const NATIVE_SCROLL_PERCENT: f64 = 1.0;

/// Swipe points that scroll content inside `rect` towards `direction`
///
/// The finger starts at the centre and moves `amplitude` pixels opposite to
/// the scroll direction.
pub fn scroll_points(rect: &Rect, direction: Direction, amplitude: u32, hold_ms: u64) -> Vec<GesturePoint> {
    let (x, y) = rect.center();
    let d = i64::from(amplitude);
    let (to_x, to_y) = match direction {
        Direction::Down => (x, y - d),
        Direction::Up => (x, y + d),
        Direction::Right => (x - d, y),
        Direction::Left => (x + d, y),
    };

    vec![
        GesturePoint::press(x, y),
        GesturePoint::wait(hold_ms),
        GesturePoint::move_to(to_x, to_y),
        GesturePoint::release(),
    ]
}

/// Touch-point sequences for everything
pub struct TouchSequence {
    hold_ms: u64,
}

#[async_trait]
impl GestureStrategy for TouchSequence {
    fn name(&self) -> &'static str {
        "touch"
    }

    async fn perform(
        &self,
        remote: &dyn Remote,
        session: &Session,
        handle: Option<&ElementHandle>,
        points: &[GesturePoint],
    ) -> Result<()> {
        remote
            .perform_touch(session.id(), handle.map(ElementHandle::element_id), points)
            .await
    }

    async fn scroll(
        &self,
        remote: &dyn Remote,
        session: &Session,
        handle: &ElementHandle,
        direction: Direction,
        amplitude: u32,
    ) -> Result<()> {
        let rect = remote.element_rect(session.id(), handle.element_id()).await?;
        let points = scroll_points(&rect, direction, amplitude, self.hold_ms);
        remote
            .perform_touch(session.id(), Some(handle.element_id()), &points)
            .await
    }
}

/// The driver's scroll primitive for scrolls; arbitrary gestures have no
/// native primitive and go through touch sequences
pub struct NativeScroll {
    platform: Platform,
    fallback: TouchSequence,
}

#[async_trait]
impl GestureStrategy for NativeScroll {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn perform(
        &self,
        remote: &dyn Remote,
        session: &Session,
        handle: Option<&ElementHandle>,
        points: &[GesturePoint],
    ) -> Result<()> {
        self.fallback.perform(remote, session, handle, points).await
    }

    /// The native primitive scrolls by one element height; `amplitude` is
    /// not used
    async fn scroll(
        &self,
        remote: &dyn Remote,
        session: &Session,
        handle: &ElementHandle,
        direction: Direction,
        _amplitude: u32,
    ) -> Result<()> {
        let (command, args) = native_scroll_command(self.platform, handle.element_id(), direction);
        remote.execute_mobile(session.id(), command, args).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::action::GestureKind;

    fn scroll_area() -> Rect {
        Rect {
            x: 0.0,
            y: 100.0,
            width: 390.0,
            height: 700.0,
        }
    }

    #[test]
    fn test_scroll_down_moves_finger_up() {
        let points = scroll_points(&scroll_area(), Direction::Down, 1500, 1000);
        assert_eq!(points[0], GesturePoint::press(195, 450));
        assert_eq!(points[1], GesturePoint::wait(1000));
        assert_eq!(points[2], GesturePoint::move_to(195, -1050));
        assert_eq!(points[3].kind, GestureKind::Release);
    }

    #[test]
    fn test_scroll_directions() {
        let area = scroll_area();
        let end = |d| {
            let p = scroll_points(&area, d, 100, 0)[2];
            (p.x.unwrap(), p.y.unwrap())
        };
        assert_eq!(end(Direction::Up), (195, 550));
        assert_eq!(end(Direction::Right), (95, 450));
        assert_eq!(end(Direction::Left), (295, 450));
    }

    #[test]
    fn test_native_scroll_command_per_platform() {
        let (command, args) = native_scroll_command(Platform::Ios, "el", Direction::Down);
        assert_eq!(command, "mobile: scroll");
        assert_eq!(args, json!({ "elementId": "el", "direction": "down" }));

        let (command, args) = native_scroll_command(Platform::Android, "el", Direction::Up);
        assert_eq!(command, "mobile: scrollGesture");
        assert_eq!(args["elementId"], "el");
        assert_eq!(args["direction"], "up");
        assert_eq!(args["percent"], 1.0);
        assert!(args.get("strategy").is_none());
    }

    #[test]
    fn test_strategy_selection() {
        assert_eq!(strategy_for(Platform::Ios, GestureMode::Auto, 0).name(), "native");
        assert_eq!(strategy_for(Platform::Android, GestureMode::Auto, 0).name(), "touch");
        assert_eq!(strategy_for(Platform::Ios, GestureMode::Touch, 0).name(), "touch");
        assert_eq!(strategy_for(Platform::Android, GestureMode::Native, 0).name(), "native");
    }
}
