//! Plain HTTP(S) page fetcher with a body size cap.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};
use url::Url;

use super::http::{build_client, check_status, transport_error};
use super::{Adapter, AdapterConfig, FETCH, required_str, unsupported};
use crate::mcp::error::{McpError, McpResult};

/// Default body cap (1 MiB).
pub const DEFAULT_MAX_BYTES: usize = 1024 * 1024;

#[derive(Debug)]
pub struct FetchAdapter {
    client: Client,
    max_bytes: usize,
}

impl FetchAdapter {
    pub fn new(max_bytes: usize) -> McpResult<Self> {
        Ok(Self {
            client: build_client(FETCH)?,
            max_bytes,
        })
    }

    async fn fetch(&self, args: &Value) -> McpResult<Value> {
        let url = parse_target(required_str(FETCH, args, "url")?)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(FETCH, &e))?;
        let mut response = check_status(FETCH, response).await?;

        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut body = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport_error(FETCH, &e))?
        {
            let room = self.max_bytes.saturating_sub(body.len());
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(json!({
            "url": final_url,
            "status": status,
            "contentType": content_type,
            "body": decode_body(&body, truncated),
            "truncated": truncated,
        }))
    }
}

/// Decode the body lossily. A truncated body first drops a trailing
/// multi-byte character that the cap cut in half.
fn decode_body(body: &[u8], truncated: bool) -> String {
    let body = if truncated { trim_partial_char(body) } else { body };
    String::from_utf8_lossy(body).into_owned()
}

fn trim_partial_char(body: &[u8]) -> &[u8] {
    let tail = body.len().saturating_sub(4)..body.len();
    let Some(lead) = tail.rev().find(|&i| body[i] & 0xC0 != 0x80) else {
        return body;
    };
    match std::str::from_utf8(&body[lead..]) {
        Err(e) if e.error_len().is_none() => &body[..lead],
        _ => body,
    }
}

/// Only absolute http(s) URLs are fetched.
fn parse_target(raw: &str) -> McpResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| McpError::validation(format!("{FETCH}: invalid url '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(McpError::validation(format!(
            "{FETCH}: unsupported scheme '{scheme}'"
        ))),
    }
}

#[async_trait]
impl Adapter for FetchAdapter {
    fn name(&self) -> &str {
        FETCH
    }

    fn defaults(&self) -> AdapterConfig {
        AdapterConfig::new(FETCH, Duration::from_secs(15), 2)
    }

    async fn connect(&self) -> McpResult<()> {
        Ok(())
    }

    async fn execute(&self, operation: &str, args: Value) -> McpResult<Value> {
        match operation {
            "fetch" => self.fetch(&args).await,
            other => Err(unsupported(FETCH, other)),
        }
    }
}
