//! Shared reqwest plumbing for the HTTP-backed adapters.
//!
//! Failures are classified the same way for every backend:
//! transport errors, 5xx and 429 become `ConnectionError` (retryable),
//! 404 becomes `NotFoundError`, and any other rejection or an undecodable
//! body becomes `AdapterError`.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use url::Url;

use crate::mcp::error::{McpError, McpResult};

const USER_AGENT: &str = concat!("mcp-gateway/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Longest error body excerpt carried into an error message.
const ERROR_EXCERPT_CHARS: usize = 200;

/// Build the client shared by one adapter.
pub(crate) fn build_client(adapter: &str) -> McpResult<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| McpError::internal(format!("{adapter}: failed to build HTTP client: {e}")))
}

/// A base URL plus the client used to reach it.
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    adapter: &'static str,
    base: Url,
    client: Client,
}

impl HttpBackend {
    pub(crate) fn new(adapter: &'static str, base: &str) -> McpResult<Self> {
        let base = Url::parse(base).map_err(|e| {
            McpError::validation(format!("{adapter}: invalid endpoint '{base}': {e}"))
        })?;
        if base.cannot_be_a_base() {
            return Err(McpError::validation(format!(
                "{adapter}: endpoint '{base}' cannot carry a path"
            )));
        }
        Ok(Self {
            adapter,
            base,
            client: build_client(adapter)?,
        })
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    /// Append percent-encoded `segments` to the base URL.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send `request` and decode a JSON body.
    pub(crate) async fn send_json(&self, request: RequestBuilder) -> McpResult<Value> {
        let response = self.send(request).await?;
        response.json::<Value>().await.map_err(|e| {
            if e.is_decode() {
                McpError::adapter(self.adapter, format!("undecodable response body: {e}"))
            } else {
                transport_error(self.adapter, &e)
            }
        })
    }

    /// Send `request`, returning the response only when its status is a
    /// success.
    pub(crate) async fn send(&self, request: RequestBuilder) -> McpResult<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(self.adapter, &e))?;
        check_status(self.adapter, response).await
    }

    /// Reachability check used by `connect`: any failure is a connection
    /// failure.
    pub(crate) async fn probe(&self, segments: &[&str]) -> McpResult<()> {
        let url = self.endpoint(segments);
        match self.send(self.client.get(url.clone())).await {
            Ok(_) => Ok(()),
            Err(McpError::Connection { message }) => Err(McpError::connection(message)),
            Err(err) => Err(McpError::connection(format!(
                "{}: probe of {url} failed: {err}",
                self.adapter
            ))),
        }
    }
}

/// Map a reqwest transport error.
pub(crate) fn transport_error(adapter: &str, err: &reqwest::Error) -> McpError {
    if err.is_builder() {
        return McpError::validation(format!("{adapter}: invalid request: {err}"));
    }
    McpError::connection(format!("{adapter}: {err}"))
}

/// Map a non-success status, passing successful responses through.
pub(crate) async fn check_status(
    adapter: &str,
    response: reqwest::Response,
) -> McpResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    Err(status_error(adapter, status, &url, &body))
}

pub(crate) fn status_error(adapter: &str, status: StatusCode, url: &Url, body: &str) -> McpError {
    let excerpt: String = body.chars().take(ERROR_EXCERPT_CHARS).collect();
    let detail = if excerpt.trim().is_empty() {
        format!("HTTP {status} from {url}")
    } else {
        format!("HTTP {status} from {url}: {}", excerpt.trim())
    };

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        McpError::connection(format!("{adapter}: {detail}"))
    } else if status == StatusCode::NOT_FOUND {
        McpError::not_found(format!("{adapter}: {detail}"))
    } else {
        McpError::adapter(adapter, detail)
    }
}
