//! WebDriver client for Appium-compatible servers
//!
//! Speaks W3C WebDriver JSON over HTTP. Each call is a single request with
//! no retries; connection failures surface as [`Error::Connection`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Map, Value};

use crate::common::config::ServerConfig;
use crate::common::{Error, Result};
use crate::driver::action::GesturePoint;

use super::remote::Remote;
use super::types::{self, ErrorValue, Rect, StatusValue, WireLocator};

/// HTTP client bound to one automation server
pub struct WebDriverClient {
    http: reqwest::Client,
    /// `http://host:port/base`, without trailing slash
    base_url: String,
}

impl WebDriverClient {
    /// Create a client for the given server
    pub fn new(server: &ServerConfig, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url(server),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a command and return the `value` member of the response
    async fn command(
        &self,
        method: Method,
        path: &str,
        command: &str,
        body: Option<Value>,
    ) -> Result<Value> {
        let body = self.send(method, path, command, body).await?;
        Ok(body.get("value").cloned().unwrap_or(Value::Null))
    }

    /// Send a command and return the whole response body
    async fn send(
        &self,
        method: Method,
        path: &str,
        command: &str,
        body: Option<Value>,
    ) -> Result<Value> {
        let url = self.url(path);
        tracing::trace!("WebDriver >>> {} {} {:?}", method, url, body);

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                Error::connection(&self.base_url, e)
            } else {
                Error::Http(e)
            }
        })?;

        let status = response.status();
        let text = response.text().await?;
        tracing::trace!("WebDriver <<< {} {}", status, text);

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            Error::Protocol(format!(
                "'{}' returned non-JSON body (HTTP {}): {}",
                command, status, e
            ))
        })?;

        if let Some(err) = error_value(&body) {
            return Err(Error::webdriver(command, &err.error, &err.message));
        }
        if !status.is_success() {
            return Err(Error::webdriver(
                command,
                &format!("HTTP {}", status.as_u16()),
                &text,
            ));
        }

        Ok(body)
    }
}

/// Build the base URL from a server config
pub fn base_url(server: &ServerConfig) -> String {
    let path = server.base_path.trim_end_matches('/');
    let path = if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    format!("http://{}:{}{}", server.host, server.port, path)
}

/// W3C error payload, if the body carries one
fn error_value(body: &Value) -> Option<ErrorValue> {
    let value = body.get("value")?;
    value.get("error")?;
    serde_json::from_value(value.clone()).ok()
}

fn string_value(command: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(Error::Protocol(format!(
            "{} returned {} instead of a string",
            command, other
        ))),
    }
}

#[async_trait]
impl Remote for WebDriverClient {
    fn endpoint(&self) -> String {
        self.base_url.clone()
    }

    async fn status(&self) -> Result<bool> {
        let value = self.command(Method::GET, "/status", "status", None).await?;
        let status: StatusValue = serde_json::from_value(value)
            .map_err(|e| Error::Protocol(format!("Failed to parse server status: {}", e)))?;
        if let Some(message) = &status.message {
            tracing::debug!("Server status: {}", message);
        }
        Ok(status.is_ready())
    }

    async fn new_session(&self, capabilities: &Map<String, Value>) -> Result<String> {
        let body = types::new_session_body(capabilities);
        let response = self
            .send(Method::POST, "/session", "newSession", Some(body))
            .await
            .map_err(|e| match e {
                Error::WebDriver { error, message, .. }
                    if error == "session not created" || error == "invalid argument" =>
                {
                    Error::Capability(message)
                }
                other => other,
            })?;

        types::session_id_from(&response)
            .ok_or_else(|| Error::Protocol("newSession response has no sessionId".to_string()))
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.command(
            Method::DELETE,
            &format!("/session/{}", session_id),
            "deleteSession",
            None,
        )
        .await?;
        Ok(())
    }

    async fn find_element(
        &self,
        session_id: &str,
        locator: &WireLocator,
    ) -> Result<Option<String>> {
        let result = self
            .command(
                Method::POST,
                &format!("/session/{}/element", session_id),
                "findElement",
                Some(serde_json::to_value(locator)?),
            )
            .await;

        match result {
            Ok(value) => types::element_id_from(&value).map(Some).ok_or_else(|| {
                Error::Protocol(format!("findElement returned no element reference: {}", value))
            }),
            Err(Error::WebDriver { error, .. }) if error == "no such element" => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn element_text(&self, session_id: &str, element_id: &str) -> Result<String> {
        let value = self
            .command(
                Method::GET,
                &format!("/session/{}/element/{}/text", session_id, element_id),
                "getElementText",
                None,
            )
            .await?;
        string_value("getElementText", value)
    }

    async fn set_value(&self, session_id: &str, element_id: &str, text: &str) -> Result<()> {
        self.command(
            Method::POST,
            &format!("/session/{}/element/{}/clear", session_id, element_id),
            "elementClear",
            Some(json!({})),
        )
        .await?;
        self.command(
            Method::POST,
            &format!("/session/{}/element/{}/value", session_id, element_id),
            "elementSendKeys",
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn click(&self, session_id: &str, element_id: &str) -> Result<()> {
        self.command(
            Method::POST,
            &format!("/session/{}/element/{}/click", session_id, element_id),
            "elementClick",
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    async fn element_displayed(&self, session_id: &str, element_id: &str) -> Result<bool> {
        let value = self
            .command(
                Method::GET,
                &format!("/session/{}/element/{}/displayed", session_id, element_id),
                "isElementDisplayed",
                None,
            )
            .await?;
        value.as_bool().ok_or_else(|| {
            Error::Protocol(format!("isElementDisplayed returned {} instead of a boolean", value))
        })
    }

    async fn element_rect(&self, session_id: &str, element_id: &str) -> Result<Rect> {
        let value = self
            .command(
                Method::GET,
                &format!("/session/{}/element/{}/rect", session_id, element_id),
                "getElementRect",
                None,
            )
            .await?;
        serde_json::from_value(value)
            .map_err(|e| Error::Protocol(format!("Failed to parse element rect: {}", e)))
    }

    async fn perform_touch(
        &self,
        session_id: &str,
        element_id: Option<&str>,
        points: &[GesturePoint],
    ) -> Result<()> {
        let body = types::touch_actions_body(points, element_id);
        self.command(
            Method::POST,
            &format!("/session/{}/actions", session_id),
            "performActions",
            Some(body),
        )
        .await?;
        Ok(())
    }

    async fn execute_mobile(&self, session_id: &str, command: &str, args: Value) -> Result<Value> {
        self.command(
            Method::POST,
            &format!("/session/{}/execute/sync", session_id),
            command,
            Some(types::execute_body(command, args)),
        )
        .await
    }

    async fn page_source(&self, session_id: &str) -> Result<String> {
        let value = self
            .command(
                Method::GET,
                &format!("/session/{}/source", session_id),
                "getPageSource",
                None,
            )
            .await?;
        string_value("getPageSource", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn server(base_path: &str) -> ServerConfig {
        ServerConfig {
            host: "localhost".to_string(),
            port: 4723,
            base_path: base_path.to_string(),
        }
    }

    #[test]
    fn test_base_url() {
        assert_eq!(base_url(&server("/wd/hub")), "http://localhost:4723/wd/hub");
        assert_eq!(base_url(&server("/wd/hub/")), "http://localhost:4723/wd/hub");
        assert_eq!(base_url(&server("/")), "http://localhost:4723");
        assert_eq!(base_url(&server("")), "http://localhost:4723");
        assert_eq!(base_url(&server("wd/hub")), "http://localhost:4723/wd/hub");
    }

    #[test]
    fn test_error_value_detection() {
        let body = json!({ "value": { "error": "no such element", "message": "nope" } });
        let err = error_value(&body).unwrap();
        assert_eq!(err.error, "no such element");
        assert_eq!(err.message, "nope");

        assert!(error_value(&json!({ "value": "text" })).is_none());
        assert!(error_value(&json!({ "value": { "ready": true } })).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        // Port 9 (discard) is closed on any sane test host
        let client = WebDriverClient::new(
            &ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 9,
                base_path: "/".to_string(),
            },
            Duration::from_secs(2),
        )
        .unwrap();

        let err = client.status().await.unwrap_err();
        assert!(matches!(err, Error::Connection { .. }), "{:?}", err);
    }

    /// Read one request: headers, then `content-length` bytes of body
    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    /// Client for a local server that answers every request with `status` and `body`
    async fn stub(status: u16, body: &'static str) -> WebDriverClient {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                read_request(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 {} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        WebDriverClient::new(
            &ServerConfig {
                host: "127.0.0.1".to_string(),
                port,
                base_path: "/".to_string(),
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn by_id() -> WireLocator {
        WireLocator::new("accessibility id", "login-button")
    }

    fn caps() -> Map<String, Value> {
        json!({ "platformName": "iOS" }).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_find_element() {
        let client = stub(
            200,
            r#"{"value":{"element-6066-11e4-a52e-4f735466cecf":"el-1"}}"#,
        )
        .await;
        let found = client.find_element("s1", &by_id()).await.unwrap();
        assert_eq!(found.as_deref(), Some("el-1"));

        let client = stub(
            404,
            r#"{"value":{"error":"no such element","message":"not here","stacktrace":""}}"#,
        )
        .await;
        assert_eq!(client.find_element("s1", &by_id()).await.unwrap(), None);

        let client = stub(200, r#"{"value":{"unexpected":true}}"#).await;
        let err = client.find_element("s1", &by_id()).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_new_session_errors() {
        let client = stub(
            500,
            r#"{"value":{"error":"session not created","message":"no app at /tmp/x.app"}}"#,
        )
        .await;
        match client.new_session(&caps()).await.unwrap_err() {
            Error::Capability(message) => assert!(message.contains("/tmp/x.app"), "{}", message),
            other => panic!("expected Capability, got {:?}", other),
        }

        let client = stub(
            400,
            r#"{"value":{"error":"invalid argument","message":"platformName is required"}}"#,
        )
        .await;
        let err = client.new_session(&caps()).await.unwrap_err();
        assert!(matches!(err, Error::Capability(_)), "{:?}", err);

        let client = stub(200, r#"{"value":{"capabilities":{}}}"#).await;
        let err = client.new_session(&caps()).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "{:?}", err);

        let client = stub(200, r#"{"value":{"sessionId":"abc","capabilities":{}}}"#).await;
        assert_eq!(client.new_session(&caps()).await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_non_json_body_is_protocol_error() {
        let client = stub(502, "<html>Bad Gateway</html>").await;
        let err = client.click("s1", "el-1").await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_stale_element_error_is_passed_through() {
        let client = stub(
            404,
            r#"{"value":{"error":"stale element reference","message":"gone"}}"#,
        )
        .await;
        match client.click("s1", "el-1").await.unwrap_err() {
            Error::WebDriver { command, error, .. } => {
                assert_eq!(command, "elementClick");
                assert_eq!(error, "stale element reference");
            }
            other => panic!("expected WebDriver error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status() {
        let client = stub(200, r#"{"value":{"ready":false,"message":"busy"}}"#).await;
        assert!(!client.status().await.unwrap());

        let client = stub(200, r#"{"value":{"build":{"version":"1.22.3"}}}"#).await;
        assert!(client.status().await.unwrap());

        let client = stub(200, r#"{"value":"up"}"#).await;
        let err = client.status().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_non_string_values_are_protocol_errors() {
        let client = stub(200, r#"{"value":"Login"}"#).await;
        assert_eq!(client.element_text("s1", "el-1").await.unwrap(), "Login");

        let client = stub(200, r#"{"value":42}"#).await;
        let err = client.element_text("s1", "el-1").await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "{:?}", err);

        let client = stub(200, r#"{"value":null}"#).await;
        let err = client.page_source("s1").await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "{:?}", err);

        let client = stub(200, r#"{"value":"yes"}"#).await;
        let err = client.element_displayed("s1", "el-1").await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "{:?}", err);
    }
}
