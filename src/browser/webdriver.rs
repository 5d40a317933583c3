//! Minimal W3C WebDriver client: enough to open a window, load the form, reload it, and quit.
//!
//! Talks plain HTTP to geckodriver or chromedriver; no TLS is involved because the driver
//! always runs on the local machine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};

use crate::error::DriverError;
use crate::settings::{BrowserKind, BrowserSettings};

use super::{BrowserLauncher, BrowserSession};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

fn client_error(source: reqwest::Error) -> DriverError {
    DriverError::Transport {
        endpoint: "client setup".into(),
        source,
    }
}

/// Issue one WebDriver command and unwrap the `value` member of the reply.
async fn send_command(
    client: &Client,
    base_url: &str,
    method: Method,
    endpoint: &str,
    body: Option<Value>,
) -> Result<Value, DriverError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), endpoint);
    log_debug!("webdriver {method} {endpoint}");

    let mut request = client.request(method, &url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let transport = |source: reqwest::Error| {
        if source.is_timeout() {
            DriverError::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else {
            DriverError::Transport {
                endpoint: endpoint.to_string(),
                source,
            }
        }
    };
    let response = request.send().await.map_err(transport)?;
    let status = response.status();
    let text = response.text().await.map_err(transport)?;
    let parsed = serde_json::from_str::<Value>(&text);

    if !status.is_success() {
        let detail = parsed.ok().and_then(|mut payload| payload.get_mut("value").map(Value::take));
        let field = |name: &str| {
            detail
                .as_ref()
                .and_then(|value| value.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        return Err(DriverError::Protocol {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            error: field("error").unwrap_or_else(|| "unknown error".into()),
            message: field("message").unwrap_or(text),
        });
    }

    let mut payload = parsed.map_err(|err| DriverError::MalformedResponse {
        endpoint: endpoint.to_string(),
        detail: err.to_string(),
    })?;
    Ok(payload
        .get_mut("value")
        .map(Value::take)
        .unwrap_or(Value::Null))
}

/// Opens sessions against a running WebDriver server.
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    client: Client,
    base_url: String,
    browser: BrowserKind,
}

impl WebDriverLauncher {
    pub fn new(settings: &BrowserSettings) -> Result<Self, DriverError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.request_timeout_ms))
            .build()
            .map_err(client_error)?;

        Ok(Self {
            client,
            base_url: settings.webdriver_url.clone(),
            browser: settings.browser,
        })
    }

    fn capabilities(&self, headless: bool) -> Value {
        let always_match = match self.browser {
            BrowserKind::Firefox => {
                let args: Vec<&str> = if headless { vec!["-headless"] } else { vec![] };
                json!({
                    "browserName": "firefox",
                    "moz:firefoxOptions": { "args": args },
                })
            }
            BrowserKind::Chrome => {
                let args: Vec<&str> = if headless { vec!["--headless=new"] } else { vec![] };
                json!({
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args },
                })
            }
        };

        json!({ "capabilities": { "alwaysMatch": always_match } })
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn open(&self, headless: bool) -> Result<Box<dyn BrowserSession>, DriverError> {
        let reply = send_command(
            &self.client,
            &self.base_url,
            Method::POST,
            "/session",
            Some(self.capabilities(headless)),
        )
        .await?;

        let session_id = reply
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::MalformedResponse {
                endpoint: "/session".into(),
                detail: "missing sessionId".into(),
            })?
            .to_string();

        log_info!(
            "opened {} session {session_id} (headless: {headless})",
            self.browser.as_str()
        );

        Ok(Box::new(WebDriverSession {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            session_id,
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct WebDriverSession {
    client: Client,
    base_url: String,
    session_id: String,
    closed: AtomicBool,
}

impl WebDriverSession {
    async fn command(&self, method: Method, suffix: &str, body: Option<Value>) -> Result<Value, DriverError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::SessionClosed);
        }
        let endpoint = format!("/session/{}{suffix}", self.session_id);
        send_command(&self.client, &self.base_url, method, &endpoint, body).await
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn refresh(&self) -> Result<(), DriverError> {
        self.command(Method::POST, "/refresh", Some(json!({})))
            .await
            .map(|_| ())
    }

    async fn close(&self) -> Result<(), DriverError> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let result = self.command(Method::DELETE, "", None).await.map(|_| ());
        match &result {
            Ok(()) => {
                self.closed.store(true, Ordering::SeqCst);
                log_info!("closed browser session {}", self.session_id);
            }
            // Leave the session open so a retry sends DELETE again.
            Err(err) if err.is_retryable() => {}
            Err(_) => self.closed.store(true, Ordering::SeqCst),
        }
        result
    }
}
