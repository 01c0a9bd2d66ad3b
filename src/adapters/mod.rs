//! Backend adapters and the shared dispatch wrapper.
//!
//! Every backend capability (search, fetch, memory, vector store, browser)
//! implements the [`Adapter`] trait. Adapters only know how to talk to their
//! backend; connection state, timeouts, and retries are applied uniformly by
//! [`AdapterHandle`], and the [`AdapterRegistry`] owns one handle per
//! capability.
//!
//! # Error classification
//!
//! Adapters report failures as [`McpError`](crate::mcp::McpError):
//!
//! - `ConnectionError`: transport failure or a transient backend fault
//!   (retried by the handle)
//! - `NotFoundError`: the addressed resource does not exist
//! - `AdapterError`: the backend rejected a well-formed request
//! - `ValidationError`: the arguments handed to the adapter are unusable

pub mod browser;
pub mod fetch;
mod handle;
mod http;
pub mod memory;
mod registry;
pub mod retry;
pub mod search;
pub mod vector;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::mcp::error::{McpError, McpResult};

pub use handle::{AdapterHandle, CallOptions};
pub use registry::AdapterRegistry;
pub use retry::RetryPolicy;

/// Canonical adapter names.
pub const SEARCH: &str = "search";
pub const FETCH: &str = "fetch";
pub const MEMORY: &str = "memory";
pub const VECTOR: &str = "vector";
pub const BROWSER: &str = "browser";

/// Uniform contract implemented by every backend client.
///
/// Implementations must tolerate concurrent `execute` calls; they hold no
/// per-call mutable state.
#[async_trait]
pub trait Adapter: Send + Sync + std::fmt::Debug {
    /// Registry key, e.g. `"search"`.
    fn name(&self) -> &str;

    /// Default timeout and retry budget for this backend.
    fn defaults(&self) -> AdapterConfig {
        AdapterConfig::new(self.name(), Duration::from_secs(10), 1)
    }

    /// Backend handshake. Called at most once per connection by the handle.
    async fn connect(&self) -> McpResult<()>;

    /// Run one backend operation.
    async fn execute(&self, operation: &str, args: Value) -> McpResult<Value>;

    /// Release backend resources.
    async fn disconnect(&self) -> McpResult<()> {
        Ok(())
    }
}

/// Timeout and retry settings for one adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    pub name: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl AdapterConfig {
    pub fn new(name: impl Into<String>, timeout: Duration, max_retries: u32) -> Self {
        Self {
            name: name.into(),
            timeout,
            max_retries,
        }
    }
}

/// Connection lifecycle of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// The last connect attempt failed; behaves like `Disconnected`.
    Failed,
}

/// Snapshot of an adapter's configuration and connection state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterStatus {
    pub name: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub connected: bool,
    pub state: ConnectionState,
}

// ─── Argument helpers ───────────────────────────────────────────────────────

pub(crate) fn required_str<'a>(adapter: &str, args: &'a Value, key: &str) -> McpResult<&'a str> {
    match args.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        Some(Value::String(_)) => Err(McpError::validation(format!(
            "{adapter}: argument '{key}' must not be empty"
        ))),
        Some(_) => Err(McpError::validation(format!(
            "{adapter}: argument '{key}' must be a string"
        ))),
        None => Err(McpError::validation(format!(
            "{adapter}: missing argument '{key}'"
        ))),
    }
}

pub(crate) fn optional_u64(adapter: &str, args: &Value, key: &str) -> McpResult<Option<u64>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            McpError::validation(format!(
                "{adapter}: argument '{key}' must be a non-negative integer"
            ))
        }),
    }
}

pub(crate) fn unsupported(adapter: &str, operation: &str) -> McpError {
    McpError::validation(format!("{adapter}: unsupported operation '{operation}'"))
}
