//! Name-keyed collection of adapter handles.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::join_all;
use serde_json::Value;
use tracing::{info, warn};

use super::handle::{AdapterHandle, CallOptions};
use super::{AdapterStatus, ConnectionState};
use crate::mcp::error::{McpError, McpResult};

/// Shared registry of adapters, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<AdapterHandle>>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle under its configured name.
    ///
    /// Fails with `ConflictError` if the name is taken.
    pub fn register(&self, handle: AdapterHandle) -> McpResult<Arc<AdapterHandle>> {
        let name = handle.name().to_string();
        let mut adapters = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if adapters.contains_key(&name) {
            return Err(McpError::conflict(format!(
                "Adapter already registered: {name}"
            )));
        }
        let handle = Arc::new(handle);
        adapters.insert(name.clone(), Arc::clone(&handle));
        info!(name: "adapter.registered", adapter = %name, "Adapter registered");
        Ok(handle)
    }

    pub fn get(&self, name: &str) -> Option<Arc<AdapterHandle>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up `name` and run `operation` through its handle.
    pub async fn execute(
        &self,
        name: &str,
        operation: &str,
        args: Value,
        options: CallOptions,
    ) -> McpResult<Value> {
        let handle = self
            .get(name)
            .ok_or_else(|| McpError::not_found(format!("Adapter not found: {name}")))?;
        handle.execute(operation, args, options).await
    }

    /// Connect every registered adapter concurrently.
    ///
    /// A failing adapter is logged and left in the failed state; the others
    /// still connect. Returns the names that failed.
    pub async fn connect_all(&self) -> Vec<String> {
        let handles = self.handles();
        let results = join_all(handles.iter().map(|h| h.connect())).await;

        let mut failed = Vec::new();
        for (handle, result) in handles.iter().zip(results) {
            if let Err(err) = result {
                warn!(
                    name: "adapter.connect_all.failed",
                    adapter = %handle.name(),
                    error = %err,
                    "Adapter unavailable at startup"
                );
                failed.push(handle.name().to_string());
            }
        }
        failed.sort();
        failed
    }

    /// Disconnect every adapter, logging failures.
    pub async fn disconnect_all(&self) {
        let handles = self.handles();
        let results = join_all(handles.iter().map(|h| h.disconnect())).await;
        for (handle, result) in handles.iter().zip(results) {
            if let Err(err) = result {
                warn!(
                    name: "adapter.disconnect.failed",
                    adapter = %handle.name(),
                    error = %err,
                    "Adapter disconnect failed"
                );
            }
        }
    }

    /// Status of every adapter, sorted by name.
    pub fn statuses(&self) -> Vec<AdapterStatus> {
        let mut statuses: Vec<_> = self.handles().iter().map(|h| h.status()).collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// Names of adapters currently connected.
    pub fn connected(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .handles()
            .iter()
            .filter(|h| h.state() == ConnectionState::Connected)
            .map(|h| h.name().to_string())
            .collect();
        names.sort();
        names
    }

    fn handles(&self) -> Vec<Arc<AdapterHandle>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}
