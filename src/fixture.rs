//! In-memory fixture app
//!
//! Implements [`Remote`] by emulating the demo app under test: a login
//! screen, a form screen with a switch, and a profile screen with slides
//! and a long scroll view. Every call is recorded so tests can check what
//! reached the "device". `e2e-harness run --fixture` runs suites against it.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::common::config::Platform;
use crate::common::{Error, Result};
use crate::driver::action::{GestureKind, GesturePoint};
use crate::webdriver::{Rect, Remote, WireLocator};

/// Scroll offset at which the end of the profile screen is in view
pub const SCROLL_END: i64 = 2_400;

/// Distance covered by one native scroll of the scroll view
const PAGE_HEIGHT: i64 = 700;

const SLIDE_COUNT: usize = 3;

const ENDPOINT: &str = "fixture://demo-app";

/// A call received by the fixture
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Status,
    NewSession(String),
    DeleteSession(String),
    FindElement(WireLocator),
    ElementText(String),
    SetValue { element: String, text: String },
    Click(String),
    Displayed(String),
    Rect(String),
    Touch {
        element: Option<String>,
        points: Vec<GesturePoint>,
    },
    ExecuteMobile { command: String, args: Value },
    PageSource,
}

/// Screens of the demo app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Form,
    Profile,
}

impl Screen {
    fn elements(self) -> &'static [&'static str] {
        match self {
            Self::Login => &[
                "app-root",
                "username-textinput",
                "password-textinput",
                "login-button",
                "reset-button",
            ],
            Self::Form => &[
                "app-root",
                "switch",
                "switch-text",
                "picker-select",
                "general-info-button",
            ],
            Self::Profile => &["app-root", "slides", "scrollarea", "scrollviewarea", "endscreen"],
        }
    }

    fn back(self) -> Self {
        match self {
            Self::Login | Self::Form => Self::Login,
            Self::Profile => Self::Form,
        }
    }
}

/// App state, reset on every new session (the app is relaunched)
#[derive(Debug)]
struct AppState {
    screen: Screen,
    username: String,
    password: String,
    switch_on: bool,
    slide: usize,
    scroll_offset: i64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            screen: Screen::Login,
            username: String::new(),
            password: String::new(),
            switch_on: false,
            slide: 0,
            scroll_offset: 0,
        }
    }
}

impl AppState {
    fn text_of(&self, name: &str) -> String {
        match name {
            "username-textinput" => self.username.clone(),
            "password-textinput" => "•".repeat(self.password.chars().count()),
            "login-button" => "Login".to_string(),
            "reset-button" => "Reset".to_string(),
            "switch" => if self.switch_on { "1" } else { "0" }.to_string(),
            "switch-text" => format!(
                "Click to turn the switch {}",
                if self.switch_on { "OFF" } else { "ON" }
            ),
            "picker-select" => "Please select a language".to_string(),
            "general-info-button" => "General info".to_string(),
            "slides" => format!("Slide {}", self.slide + 1),
            "endscreen" => "End of screen".to_string(),
            _ => String::new(),
        }
    }

    fn on_screen(&self, name: &str) -> bool {
        self.screen.elements().contains(&name)
    }

    fn scroll_by(&mut self, delta: i64) {
        if self.screen == Screen::Profile {
            self.scroll_offset = (self.scroll_offset + delta).clamp(0, SCROLL_END);
        }
    }

    fn slide_by(&mut self, delta: i64) {
        if self.screen == Screen::Profile {
            self.slide = if delta > 0 {
                (self.slide + 1).min(SLIDE_COUNT - 1)
            } else {
                self.slide.saturating_sub(1)
            };
        }
    }
}

#[derive(Debug, Default)]
struct FixtureState {
    next_session: u64,
    open: HashSet<String>,
    /// Platform of the current session; decides which `mobile:` commands exist
    platform: Option<Platform>,
    opened: usize,
    closed: usize,
    app: AppState,
    calls: Vec<Call>,
}

/// In-memory [`Remote`] emulating the demo app
pub struct FixtureApp {
    state: Mutex<FixtureState>,
    reachable: bool,
    ready: bool,
}

impl Default for FixtureApp {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureApp {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FixtureState::default()),
            reachable: true,
            ready: true,
        }
    }

    /// A server nobody is listening on
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new()
        }
    }

    /// A server that answers but never becomes ready
    pub fn not_ready() -> Self {
        Self {
            ready: false,
            ..Self::new()
        }
    }

    fn lock(&self) -> MutexGuard<'_, FixtureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn open_sessions(&self) -> usize {
        self.lock().open.len()
    }

    pub fn sessions_opened(&self) -> usize {
        self.lock().opened
    }

    pub fn sessions_closed(&self) -> usize {
        self.lock().closed
    }

    pub fn screen(&self) -> Screen {
        self.lock().app.screen
    }

    pub fn find_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::FindElement(_)))
    }

    pub fn set_value_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::SetValue { .. }))
    }

    /// Point sequences of every touch gesture, in dispatch order
    pub fn touch_sequences(&self) -> Vec<Vec<GesturePoint>> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Touch { points, .. } => Some(points.clone()),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn check_reachable(&self) -> Result<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(Error::connection(ENDPOINT, "connection refused"))
        }
    }
}

fn check_session(state: &FixtureState, command: &str, session_id: &str) -> Result<()> {
    if state.open.contains(session_id) {
        Ok(())
    } else {
        Err(Error::webdriver(
            command,
            "invalid session id",
            &format!("session {} is not open", session_id),
        ))
    }
}

/// Resolve an element id to an element name on the current screen
fn element_name<'a>(
    state: &FixtureState,
    command: &str,
    session_id: &str,
    element_id: &'a str,
) -> Result<&'a str> {
    check_session(state, command, session_id)?;
    match element_id.split_once('/') {
        Some((sid, name)) if sid == session_id && state.app.on_screen(name) => Ok(name),
        _ => Err(Error::webdriver(
            command,
            "stale element reference",
            &format!("element {} is no longer attached", element_id),
        )),
    }
}

/// First double-quoted string after `prefix`, unescaped
fn quoted_after(selector: &str, prefix: &str) -> Option<String> {
    let rest = &selector[selector.find(prefix)? + prefix.len()..];
    let mut out = String::new();
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?),
            '"' => return Some(out),
            c => out.push(c),
        }
    }
    None
}

fn resolve(app: &AppState, locator: &WireLocator) -> Result<Option<&'static str>> {
    let by_name = |name: &str| app.screen.elements().iter().copied().find(|e| *e == name);
    let by_text = |text: &str| {
        app.screen
            .elements()
            .iter()
            .copied()
            .find(|e| app.text_of(e) == text)
    };

    match locator.using.as_str() {
        "accessibility id" | "id" => Ok(by_name(&locator.value)),
        "-ios predicate string" => Ok(quoted_after(&locator.value, "label == \"")
            .as_deref()
            .and_then(by_text)),
        "-android uiautomator" => Ok(quoted_after(&locator.value, ".text(\"")
            .as_deref()
            .and_then(by_text)),
        other => Err(Error::webdriver(
            "findElement",
            "invalid selector",
            &format!("unsupported locator strategy '{}'", other),
        )),
    }
}

/// Apply a touch gesture to the app
fn apply_touch(app: &mut AppState, points: &[GesturePoint]) {
    let start = points
        .iter()
        .find(|p| p.kind == GestureKind::Press)
        .and_then(|p| Some((p.x?, p.y?)));
    let end = points
        .iter()
        .rev()
        .find(|p| p.kind == GestureKind::MoveTo)
        .and_then(|p| Some((p.x?, p.y?)));

    match (start, end) {
        // Tap on the navigation bar's back button
        (Some((x, y)), None) if x < 60 && y < 100 => app.screen = app.screen.back(),
        (Some((x0, y0)), Some((x1, y1))) => {
            let (dx, dy) = (x1 - x0, y1 - y0);
            if dy.abs() >= dx.abs() {
                app.scroll_by(-dy);
            } else {
                app.slide_by(-dx);
            }
        }
        _ => {}
    }
}

#[async_trait]
impl Remote for FixtureApp {
    fn endpoint(&self) -> String {
        ENDPOINT.to_string()
    }

    async fn status(&self) -> Result<bool> {
        self.check_reachable()?;
        self.lock().calls.push(Call::Status);
        Ok(self.ready)
    }

    async fn new_session(&self, capabilities: &Map<String, Value>) -> Result<String> {
        self.check_reachable()?;
        if !capabilities.contains_key("platformName") {
            return Err(Error::Capability("platformName is required".to_string()));
        }

        let mut state = self.lock();
        state.next_session += 1;
        let id = format!("fixture-{}", state.next_session);
        state.open.insert(id.clone());
        state.opened += 1;
        state.app = AppState::default();
        state.platform = Some(match capabilities.get("platformName").and_then(Value::as_str) {
            Some(name) if name.eq_ignore_ascii_case("android") => Platform::Android,
            _ => Platform::Ios,
        });
        state.calls.push(Call::NewSession(id.clone()));
        Ok(id)
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::DeleteSession(session_id.to_string()));
        check_session(&state, "deleteSession", session_id)?;
        state.open.remove(session_id);
        state.closed += 1;
        Ok(())
    }

    async fn find_element(
        &self,
        session_id: &str,
        locator: &WireLocator,
    ) -> Result<Option<String>> {
        let mut state = self.lock();
        state.calls.push(Call::FindElement(locator.clone()));
        check_session(&state, "findElement", session_id)?;
        Ok(resolve(&state.app, locator)?.map(|name| format!("{}/{}", session_id, name)))
    }

    async fn element_text(&self, session_id: &str, element_id: &str) -> Result<String> {
        let mut state = self.lock();
        state.calls.push(Call::ElementText(element_id.to_string()));
        let name = element_name(&state, "getElementText", session_id, element_id)?;
        Ok(state.app.text_of(name))
    }

    async fn set_value(&self, session_id: &str, element_id: &str, text: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::SetValue {
            element: element_id.to_string(),
            text: text.to_string(),
        });
        let name = element_name(&state, "elementSendKeys", session_id, element_id)?;
        match name {
            "username-textinput" => state.app.username = text.to_string(),
            "password-textinput" => state.app.password = text.to_string(),
            other => {
                return Err(Error::webdriver(
                    "elementSendKeys",
                    "invalid element state",
                    &format!("{} does not accept text", other),
                ))
            }
        }
        Ok(())
    }

    async fn click(&self, session_id: &str, element_id: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::Click(element_id.to_string()));
        let name = element_name(&state, "elementClick", session_id, element_id)?;
        let app = &mut state.app;
        match name {
            "login-button" => app.screen = Screen::Form,
            "reset-button" => {
                app.username.clear();
                app.password.clear();
            }
            "switch" => app.switch_on = !app.switch_on,
            "general-info-button" => app.screen = Screen::Profile,
            _ => {}
        }
        Ok(())
    }

    async fn element_displayed(&self, session_id: &str, element_id: &str) -> Result<bool> {
        let mut state = self.lock();
        state.calls.push(Call::Displayed(element_id.to_string()));
        let name = element_name(&state, "isElementDisplayed", session_id, element_id)?;
        Ok(name != "endscreen" || state.app.scroll_offset >= SCROLL_END)
    }

    async fn element_rect(&self, session_id: &str, element_id: &str) -> Result<Rect> {
        let mut state = self.lock();
        state.calls.push(Call::Rect(element_id.to_string()));
        let name = element_name(&state, "getElementRect", session_id, element_id)?;
        let (x, y, width, height) = match name {
            "app-root" => (0.0, 0.0, 390.0, 844.0),
            "scrollarea" | "scrollviewarea" => (0.0, 100.0, 390.0, 700.0),
            "slides" => (0.0, 120.0, 390.0, 300.0),
            _ => (20.0, 200.0, 350.0, 48.0),
        };
        Ok(Rect {
            x,
            y,
            width,
            height,
        })
    }

    async fn perform_touch(
        &self,
        session_id: &str,
        element_id: Option<&str>,
        points: &[GesturePoint],
    ) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::Touch {
            element: element_id.map(str::to_string),
            points: points.to_vec(),
        });
        match element_id {
            Some(id) => {
                element_name(&state, "performActions", session_id, id)?;
            }
            None => check_session(&state, "performActions", session_id)?,
        }
        apply_touch(&mut state.app, points);
        Ok(())
    }

    async fn execute_mobile(&self, session_id: &str, command: &str, args: Value) -> Result<Value> {
        let mut state = self.lock();
        state.calls.push(Call::ExecuteMobile {
            command: command.to_string(),
            args: args.clone(),
        });
        check_session(&state, command, session_id)?;

        // Scroll commands move content towards `direction`; swipe moves the
        // finger, so content goes the other way
        let platform = state.platform.unwrap_or(Platform::Ios);
        let (sign, distance) = match (platform, command) {
            (Platform::Ios, "mobile: scroll") => (1, PAGE_HEIGHT),
            (Platform::Ios, "mobile: swipe") => (-1, PAGE_HEIGHT),
            (Platform::Android, "mobile: scrollGesture") => {
                let percent = args.get("percent").and_then(Value::as_f64).unwrap_or(1.0);
                (1, (PAGE_HEIGHT as f64 * percent).round() as i64)
            }
            (Platform::Android, "mobile: scroll")
                if args.get("strategy").is_none() || args.get("selector").is_none() =>
            {
                return Err(Error::webdriver(
                    command,
                    "invalid argument",
                    "'strategy' and 'selector' are required",
                ))
            }
            _ => {
                return Err(Error::webdriver(
                    command,
                    "unknown method",
                    &format!("'{}' is not supported on {}", command, platform),
                ))
            }
        };

        let app = &mut state.app;
        match args.get("direction").and_then(Value::as_str).unwrap_or("") {
            "down" => app.scroll_by(sign * distance),
            "up" => app.scroll_by(-sign * distance),
            "right" => app.slide_by(sign),
            "left" => app.slide_by(-sign),
            other => {
                return Err(Error::webdriver(
                    command,
                    "invalid argument",
                    &format!("unknown direction '{}'", other),
                ))
            }
        }
        Ok(Value::Null)
    }

    async fn page_source(&self, session_id: &str) -> Result<String> {
        let mut state = self.lock();
        state.calls.push(Call::PageSource);
        check_session(&state, "getPageSource", session_id)?;
        let app = &state.app;
        Ok(format!(
            "<AppRoot screen=\"{:?}\" offset=\"{}\" slide=\"{}\" switch=\"{}\"/>",
            app.screen, app.scroll_offset, app.slide, app.switch_on
        ))
    }
}
