//! Connection state machine plus the timeout/retry wrapper around one adapter.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::retry::RetryPolicy;
use super::{Adapter, AdapterConfig, AdapterStatus, ConnectionState};
use crate::mcp::error::{McpError, McpResult};

/// Per-call overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Replaces the adapter's default timeout for this call.
    pub timeout: Option<Duration>,
}

impl CallOptions {
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Shared, long-lived handle to one adapter.
///
/// The handle owns the connection state machine and wraps every `execute`
/// call with the configured timeout and retry policy. A timeout drops the
/// pending future; the backend may still finish the operation on its side.
#[derive(Debug)]
pub struct AdapterHandle {
    adapter: Arc<dyn Adapter>,
    config: AdapterConfig,
    retry: RetryPolicy,
    state: RwLock<ConnectionState>,
    // Serializes connect/disconnect so concurrent callers share one handshake.
    transition: Mutex<()>,
}

impl AdapterHandle {
    /// Wrap `adapter` with its own declared defaults.
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        let config = adapter.defaults();
        Self::with_config(adapter, config, RetryPolicy::default())
    }

    /// Wrap `adapter` with explicit settings. `retry.max_retries` is taken from
    /// `config`.
    pub fn with_config(adapter: Arc<dyn Adapter>, config: AdapterConfig, retry: RetryPolicy) -> Self {
        let retry = RetryPolicy {
            max_retries: config.max_retries,
            ..retry
        };
        Self {
            adapter,
            config,
            retry,
            state: RwLock::new(ConnectionState::Disconnected),
            transition: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn status(&self) -> AdapterStatus {
        let state = self.state();
        AdapterStatus {
            name: self.config.name.clone(),
            timeout_ms: duration_ms(self.config.timeout),
            max_retries: self.config.max_retries,
            connected: state == ConnectionState::Connected,
            state,
        }
    }

    fn set_state(&self, next: ConnectionState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Connect to the backend. A no-op when already connected.
    ///
    /// Any failure, including a handshake that outlives the adapter timeout,
    /// leaves the adapter in [`ConnectionState::Failed`] and is reported as a
    /// `ConnectionError`.
    pub async fn connect(&self) -> McpResult<()> {
        let _guard = self.transition.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        self.set_state(ConnectionState::Connecting);
        let outcome = match tokio::time::timeout(self.config.timeout, self.adapter.connect()).await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(McpError::connection(format!(
                "handshake timed out after {} ms",
                duration_ms(self.config.timeout)
            ))),
        };

        match outcome {
            Ok(()) => {
                self.set_state(ConnectionState::Connected);
                info!(name: "adapter.connected", adapter = %self.config.name, "Adapter connected");
                Ok(())
            }
            Err(err) => {
                self.set_state(ConnectionState::Failed);
                warn!(
                    name: "adapter.connect.failed",
                    adapter = %self.config.name,
                    error = %err,
                    "Adapter failed to connect"
                );
                Err(match err {
                    McpError::Connection { .. } => err,
                    other => McpError::connection(format!(
                        "adapter '{}' failed to connect: {other}",
                        self.config.name
                    )),
                })
            }
        }
    }

    /// Disconnect from the backend. A no-op unless connected.
    pub async fn disconnect(&self) -> McpResult<()> {
        let _guard = self.transition.lock().await;
        if !self.is_connected() {
            self.set_state(ConnectionState::Disconnected);
            return Ok(());
        }

        let result = self.adapter.disconnect().await;
        self.set_state(ConnectionState::Disconnected);
        info!(name: "adapter.disconnected", adapter = %self.config.name, "Adapter disconnected");
        result
    }

    /// Run `operation` under the timeout and retry policy.
    ///
    /// An adapter left [`ConnectionState::Failed`] by an earlier handshake gets
    /// one reconnect attempt first. A disconnected adapter is refused.
    ///
    /// Only connection-class failures are retried. A timed-out attempt fails
    /// the call immediately with `TimeoutError`. When every attempt fails, a
    /// `ConnectionError` summarising the last failure is returned.
    #[instrument(
        name = "adapter.execute",
        skip(self, args, options),
        fields(adapter = %self.config.name)
    )]
    pub async fn execute(
        &self,
        operation: &str,
        args: Value,
        options: CallOptions,
    ) -> McpResult<Value> {
        // A failed handshake is retried on demand; an explicit disconnect is not.
        if self.state() == ConnectionState::Failed {
            debug!(name: "adapter.reconnect", operation, "Reconnecting failed adapter");
            self.connect().await?;
        }
        if !self.is_connected() {
            return Err(McpError::connection(format!(
                "adapter '{}' is not connected",
                self.config.name
            )));
        }

        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let started = Instant::now();
        let mut attempt: u32 = 0;

        let result = loop {
            attempt += 1;
            let call = self.adapter.execute(operation, args.clone());
            let err = match tokio::time::timeout(timeout, call).await {
                Ok(Ok(value)) => break Ok(value),
                Ok(Err(err)) => err,
                Err(_elapsed) => {
                    break Err(McpError::timeout(
                        self.config.name.clone(),
                        operation,
                        duration_ms(timeout),
                    ));
                }
            };

            if !err.is_retryable() {
                break Err(err);
            }
            if attempt >= self.retry.max_attempts() {
                break Err(McpError::connection(format!(
                    "adapter '{}' operation '{operation}' failed after {attempt} attempt(s): {err}",
                    self.config.name
                )));
            }

            let delay = self.retry.delay_for(attempt - 1);
            metrics::counter!("adapter_retries_total", "adapter" => self.config.name.clone())
                .increment(1);
            debug!(
                name: "adapter.retry",
                operation,
                attempt,
                delay_ms = duration_ms(delay),
                error = %err,
                "Retrying adapter call"
            );
            tokio::time::sleep(delay).await;
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind_name(),
        };
        metrics::counter!(
            "adapter_calls_total",
            "adapter" => self.config.name.clone(),
            "outcome" => outcome
        )
        .increment(1);
        metrics::histogram!("adapter_call_duration_seconds", "adapter" => self.config.name.clone())
            .record(started.elapsed().as_secs_f64());

        result
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
