//! WebDriver wire types
//!
//! Request bodies and response values of the W3C WebDriver protocol, plus
//! the Appium extensions the harness relies on (`mobile:` commands).
//! See: https://www.w3.org/TR/webdriver2/

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::driver::action::{GestureKind, GesturePoint};

/// Key under which W3C element references are returned
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Key used by the legacy JSON Wire Protocol
pub const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

/// Duration of a `pointerMove` when a gesture point gives none
pub const DEFAULT_MOVE_MS: u64 = 250;

/// Capability keys defined by W3C; everything else needs a vendor prefix
pub const W3C_CAPABILITIES: &[&str] = &[
    "acceptInsecureCerts",
    "browserName",
    "browserVersion",
    "pageLoadStrategy",
    "platformName",
    "proxy",
    "setWindowRect",
    "strictFileInteractability",
    "timeouts",
    "unhandledPromptBehavior",
    "webSocketUrl",
];

/// Locator strategy and selector as sent in a find-element request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireLocator {
    pub using: String,
    pub value: String,
}

impl WireLocator {
    pub fn new(using: &str, value: impl Into<String>) -> Self {
        Self {
            using: using.to_string(),
            value: value.into(),
        }
    }
}

/// Error payload of a failed command
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorValue {
    pub error: String,
    #[serde(default)]
    pub message: String,
}

/// Value of `GET /status`
#[derive(Debug, Clone, Deserialize)]
pub struct StatusValue {
    #[serde(default)]
    pub ready: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

impl StatusValue {
    /// Appium 1 omits `ready`; answering at all means ready there
    pub fn is_ready(&self) -> bool {
        self.ready.unwrap_or(true)
    }
}

/// Element rectangle in viewport pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Centre point, rounded to whole pixels
    pub fn center(&self) -> (i64, i64) {
        (
            (self.x + self.width / 2.0).round() as i64,
            (self.y + self.height / 2.0).round() as i64,
        )
    }
}

/// Body of `POST /session`
pub fn new_session_body(capabilities: &Map<String, Value>) -> Value {
    json!({
        "capabilities": {
            "alwaysMatch": capabilities,
            "firstMatch": [{}],
        }
    })
}

/// Extract the session id from a new-session response body
///
/// W3C servers nest it under `value`, JSON Wire servers put it at the top.
pub fn session_id_from(body: &Value) -> Option<String> {
    body.get("value")
        .and_then(|v| v.get("sessionId"))
        .or_else(|| body.get("sessionId"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Extract an element id from an element reference
pub fn element_id_from(value: &Value) -> Option<String> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get(LEGACY_ELEMENT_KEY))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Element reference as used for `origin` and script arguments
pub fn element_reference(element_id: &str) -> Value {
    json!({ ELEMENT_KEY: element_id, LEGACY_ELEMENT_KEY: element_id })
}

/// Body of `POST /session/{id}/actions` for one touch pointer
///
/// Coordinates are viewport pixels. A press without coordinates lands on
/// the centre of `element_id`.
pub fn touch_actions_body(points: &[GesturePoint], element_id: Option<&str>) -> Value {
    let mut actions = Vec::with_capacity(points.len() + 1);

    for point in points {
        match point.kind {
            GestureKind::Press => {
                let mv = match (point.x, point.y, element_id) {
                    (Some(x), Some(y), _) => json!({
                        "type": "pointerMove", "duration": 0,
                        "x": x, "y": y, "origin": "viewport",
                    }),
                    (_, _, Some(id)) => json!({
                        "type": "pointerMove", "duration": 0,
                        "x": 0, "y": 0, "origin": element_reference(id),
                    }),
                    _ => json!({
                        "type": "pointerMove", "duration": 0,
                        "x": 0, "y": 0, "origin": "pointer",
                    }),
                };
                actions.push(mv);
                actions.push(json!({ "type": "pointerDown", "button": 0 }));
            }
            GestureKind::Wait => {
                actions.push(json!({
                    "type": "pause",
                    "duration": point.duration_ms.unwrap_or(0),
                }));
            }
            GestureKind::MoveTo => {
                actions.push(json!({
                    "type": "pointerMove",
                    "duration": point.duration_ms.unwrap_or(DEFAULT_MOVE_MS),
                    "x": point.x.unwrap_or(0),
                    "y": point.y.unwrap_or(0),
                    "origin": "viewport",
                }));
            }
            GestureKind::Release => {
                actions.push(json!({ "type": "pointerUp", "button": 0 }));
            }
        }
    }

    json!({
        "actions": [{
            "type": "pointer",
            "id": "finger1",
            "parameters": { "pointerType": "touch" },
            "actions": actions,
        }]
    })
}

/// Body of `POST /session/{id}/execute/sync` for an Appium `mobile:` command
pub fn execute_body(script: &str, args: Value) -> Value {
    json!({ "script": script, "args": [args] })
}
