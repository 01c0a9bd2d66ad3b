//! Headless browser service client (browserless-style HTTP API).

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::{Value, json};

use super::http::HttpBackend;
use super::{Adapter, AdapterConfig, BROWSER, required_str, unsupported};
use crate::mcp::error::{McpError, McpResult};

#[derive(Debug)]
pub struct BrowserAdapter {
    backend: HttpBackend,
}

impl BrowserAdapter {
    pub fn new(endpoint: &str) -> McpResult<Self> {
        Ok(Self {
            backend: HttpBackend::new(BROWSER, endpoint)?,
        })
    }

    /// Rendered HTML of a page after scripts ran.
    async fn content(&self, args: &Value) -> McpResult<Value> {
        let url = required_str(BROWSER, args, "url")?;
        let mut body = json!({ "url": url });
        if let Some(selector) = args.get("waitForSelector").and_then(Value::as_str) {
            body["waitForSelector"] = json!({ "selector": selector });
        }

        let request = self
            .backend
            .client()
            .post(self.backend.endpoint(&["content"]))
            .json(&body);
        let response = self.backend.send(request).await?;
        let html = response
            .text()
            .await
            .map_err(|e| McpError::adapter(BROWSER, format!("unreadable body: {e}")))?;

        Ok(json!({
            "url": url,
            "length": html.chars().count(),
            "html": html,
        }))
    }

    /// PNG screenshot, returned base64-encoded.
    async fn screenshot(&self, args: &Value) -> McpResult<Value> {
        let url = required_str(BROWSER, args, "url")?;
        let full_page = args.get("fullPage").and_then(Value::as_bool).unwrap_or(false);

        let request = self
            .backend
            .client()
            .post(self.backend.endpoint(&["screenshot"]))
            .json(&json!({
                "url": url,
                "options": { "type": "png", "fullPage": full_page },
            }));
        let response = self.backend.send(request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| McpError::adapter(BROWSER, format!("unreadable body: {e}")))?;

        Ok(json!({
            "url": url,
            "mimeType": "image/png",
            "bytes": bytes.len(),
            "data": STANDARD.encode(&bytes),
        }))
    }
}

#[async_trait]
impl Adapter for BrowserAdapter {
    fn name(&self) -> &str {
        BROWSER
    }

    fn defaults(&self) -> AdapterConfig {
        AdapterConfig::new(BROWSER, Duration::from_secs(30), 1)
    }

    async fn connect(&self) -> McpResult<()> {
        self.backend.probe(&["json", "version"]).await
    }

    async fn execute(&self, operation: &str, args: Value) -> McpResult<Value> {
        match operation {
            "content" => self.content(&args).await,
            "screenshot" => self.screenshot(&args).await,
            other => Err(unsupported(BROWSER, other)),
        }
    }
}
