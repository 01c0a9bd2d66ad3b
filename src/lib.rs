//! MCP Gateway
//!
//! A command gateway speaking a small JSON envelope protocol. Agents send
//! commands tagged with a session id; the gateway resolves the session,
//! validates parameters, and dispatches to a registered handler. Handlers
//! reach external backends (web search, page fetch, key-value memory, vector
//! store, headless browser) through adapters that share one timeout, retry
//! and connection-state policy.
//!
//! # Architecture
//!
//! - **Server**: Axum HTTP transport (`POST /mcp`, inspection routes)
//! - **Router**: session resolution, schema validation, handler dispatch
//! - **Sessions**: in-memory, TTL-based, swept in the background
//! - **Adapters**: backend clients behind a uniform timeout/retry wrapper
//!
//! # Modules
//!
//! - [`mcp`]: protocol, errors, command registry and router
//! - [`session`]: session store
//! - [`adapters`]: backend adapters and their dispatch wrapper
//! - [`handlers`]: built-in commands
//! - [`config`]: layered configuration
//! - [`server`]: HTTP surface

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod mcp;
pub mod server;
pub mod session;
pub mod telemetry;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::adapters::{
    AdapterHandle, AdapterRegistry, browser::BrowserAdapter, fetch::FetchAdapter,
    memory::MemoryAdapter, search::SearchAdapter, vector::VectorAdapter,
};
use crate::config::{AdaptersConfig, AppConfig};
use crate::mcp::{CommandRegistry, CommandRouter, McpResult};
use crate::session::SessionStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Command router (owns the command registry).
    pub router: CommandRouter,
    /// Session store shared with the router.
    pub sessions: SessionStore,
    /// Backend adapters.
    pub adapters: AdapterRegistry,
    /// Prometheus handle, absent when no recorder was installed.
    pub metrics: Option<PrometheusHandle>,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("commands", &self.router.commands().len())
            .field("sessions", &self.sessions.len())
            .field("adapters", &self.adapters.len())
            .finish()
    }
}

impl AppState {
    /// Wire the session store and router, then register built-in commands
    /// for the adapters present in `adapters`.
    pub fn new(
        config: Arc<AppConfig>,
        adapters: AdapterRegistry,
        metrics: Option<PrometheusHandle>,
    ) -> McpResult<Self> {
        let sessions = SessionStore::new(config.session.ttl());
        let router = CommandRouter::new(CommandRegistry::new(), sessions.clone());
        handlers::register_builtin_commands(&router, &adapters)?;

        Ok(Self {
            router,
            sessions,
            adapters,
            metrics,
            config,
        })
    }
}

/// Build one handle per configured backend.
///
/// Fetch is always available. Memory falls back to the in-process store
/// when no endpoint is configured. Search, vector and browser need an
/// endpoint and are skipped otherwise.
pub fn build_adapter_registry(config: &AdaptersConfig) -> McpResult<AdapterRegistry> {
    let registry = AdapterRegistry::new();
    let retry = config.retry_policy();
    let register = |adapter: Arc<dyn adapters::Adapter>| -> McpResult<()> {
        let settings = config.adapter_config(adapter.name());
        registry.register(AdapterHandle::with_config(adapter, settings, retry))?;
        Ok(())
    };

    register(Arc::new(FetchAdapter::new(config.fetch_max_bytes)?))?;
    register(Arc::new(match config.endpoint(adapters::MEMORY) {
        Some(url) => MemoryAdapter::remote(url)?,
        None => MemoryAdapter::in_process(),
    }))?;
    if let Some(url) = config.endpoint(adapters::SEARCH) {
        register(Arc::new(SearchAdapter::new(url)?))?;
    }
    if let Some(url) = config.endpoint(adapters::VECTOR) {
        register(Arc::new(VectorAdapter::new(url)?))?;
    }
    if let Some(url) = config.endpoint(adapters::BROWSER) {
        register(Arc::new(BrowserAdapter::new(url)?))?;
    }

    Ok(registry)
}
