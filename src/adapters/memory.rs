//! Key-value memory for agents, backed by an in-process map or a REST store.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use super::http::{HttpBackend, check_status, transport_error};
use super::{Adapter, AdapterConfig, MEMORY, required_str, unsupported};
use crate::mcp::error::{McpError, McpResult};

/// Key looked up by `connect`. It is never written, so a healthy store
/// answers "not found".
pub const PROBE_KEY: &str = "__mcp_connection_probe__";

/// Storage contract behind the memory adapter.
#[async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Fails with `NotFoundError` when `key` is absent.
    async fn get(&self, key: &str) -> McpResult<Value>;

    async fn set(&self, key: &str, value: Value) -> McpResult<()>;

    /// Returns whether a value was removed.
    async fn delete(&self, key: &str) -> McpResult<bool>;

    /// Keys in ascending order, optionally filtered by prefix.
    async fn list(&self, prefix: Option<&str>) -> McpResult<Vec<String>>;
}

fn key_not_found(key: &str) -> McpError {
    McpError::not_found(format!("{MEMORY}: key not found: {key}"))
}

// ─── In-process store ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryKv {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKv {
    async fn get(&self, key: &str) -> McpResult<Value> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| key_not_found(key))
    }

    async fn set(&self, key: &str, value: Value) -> McpResult<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> McpResult<bool> {
        Ok(self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some())
    }

    async fn list(&self, prefix: Option<&str>) -> McpResult<Vec<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .keys()
            .filter(|k| prefix.is_none_or(|p| k.starts_with(p)))
            .cloned()
            .collect())
    }
}

// ─── REST store ─────────────────────────────────────────────────────────────

/// Remote store speaking `GET/PUT/DELETE {base}/keys/{key}` and
/// `GET {base}/keys?prefix=`. Values travel as `{"value": ...}`.
#[derive(Debug)]
pub struct HttpKv {
    backend: HttpBackend,
}

#[derive(Debug, Deserialize)]
struct ValueBody {
    value: Value,
}

#[derive(Debug, Deserialize)]
struct KeysBody {
    #[serde(default)]
    keys: Vec<String>,
}

impl HttpKv {
    pub fn new(endpoint: &str) -> McpResult<Self> {
        Ok(Self {
            backend: HttpBackend::new(MEMORY, endpoint)?,
        })
    }
}

#[async_trait]
impl KeyValueStore for HttpKv {
    async fn get(&self, key: &str) -> McpResult<Value> {
        let url = self.backend.endpoint(&["keys", key]);
        let body = self
            .backend
            .send_json(self.backend.client().get(url))
            .await
            .map_err(|err| match err {
                McpError::NotFound { .. } => key_not_found(key),
                other => other,
            })?;
        let parsed: ValueBody = serde_json::from_value(body)
            .map_err(|e| McpError::adapter(MEMORY, format!("unexpected response shape: {e}")))?;
        Ok(parsed.value)
    }

    async fn set(&self, key: &str, value: Value) -> McpResult<()> {
        let url = self.backend.endpoint(&["keys", key]);
        self.backend
            .send(self.backend.client().put(url).json(&json!({ "value": value })))
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> McpResult<bool> {
        let url = self.backend.endpoint(&["keys", key]);
        let response = self
            .backend
            .client()
            .delete(url)
            .send()
            .await
            .map_err(|e| transport_error(MEMORY, &e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(MEMORY, response).await?;
        Ok(true)
    }

    async fn list(&self, prefix: Option<&str>) -> McpResult<Vec<String>> {
        let mut request = self.backend.client().get(self.backend.endpoint(&["keys"]));
        if let Some(prefix) = prefix {
            request = request.query(&[("prefix", prefix)]);
        }
        let body = self.backend.send_json(request).await?;
        let parsed: KeysBody = serde_json::from_value(body)
            .map_err(|e| McpError::adapter(MEMORY, format!("unexpected response shape: {e}")))?;
        let mut keys = parsed.keys;
        keys.sort();
        Ok(keys)
    }
}

// ─── Adapter ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct MemoryAdapter {
    store: Arc<dyn KeyValueStore>,
}

impl MemoryAdapter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Memory adapter over the in-process store.
    pub fn in_process() -> Self {
        Self::new(Arc::new(InMemoryKv::new()))
    }

    /// Memory adapter over a REST store at `endpoint`.
    pub fn remote(endpoint: &str) -> McpResult<Self> {
        Ok(Self::new(Arc::new(HttpKv::new(endpoint)?)))
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn name(&self) -> &str {
        MEMORY
    }

    fn defaults(&self) -> AdapterConfig {
        AdapterConfig::new(MEMORY, Duration::from_secs(5), 1)
    }

    async fn connect(&self) -> McpResult<()> {
        match self.store.get(PROBE_KEY).await {
            Ok(_) | Err(McpError::NotFound { .. }) => Ok(()),
            Err(err) => Err(McpError::connection(format!(
                "{MEMORY}: connection probe failed: {err}"
            ))),
        }
    }

    async fn execute(&self, operation: &str, args: Value) -> McpResult<Value> {
        match operation {
            "get" => {
                let key = required_str(MEMORY, &args, "key")?;
                let value = self.store.get(key).await?;
                Ok(json!({ "key": key, "value": value }))
            }
            "set" => {
                let key = required_str(MEMORY, &args, "key")?;
                let value = args
                    .get("value")
                    .cloned()
                    .ok_or_else(|| McpError::validation(format!("{MEMORY}: missing argument 'value'")))?;
                self.store.set(key, value).await?;
                Ok(json!({ "key": key, "stored": true }))
            }
            "delete" => {
                let key = required_str(MEMORY, &args, "key")?;
                let deleted = self.store.delete(key).await?;
                Ok(json!({ "key": key, "deleted": deleted }))
            }
            "list" => {
                let prefix = args.get("prefix").and_then(Value::as_str);
                let keys = self.store.list(prefix).await?;
                Ok(json!({ "count": keys.len(), "keys": keys }))
            }
            other => Err(unsupported(MEMORY, other)),
        }
    }
}
