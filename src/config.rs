//! Layered application configuration.
//!
//! Precedence, highest first: CLI flags (and the env vars clap maps onto
//! them), `MCP_`-prefixed environment variables such as `MCP_SERVER__PORT`,
//! the config file, then built-in defaults.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::adapters::{self, AdapterConfig, RetryPolicy};

/// Config file picked up from the working directory when none is named.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Session time-to-live in seconds
    #[arg(long)]
    pub session_ttl_secs: Option<u64>,

    /// Disable the request timeout middleware
    #[arg(long)]
    pub timeout_disabled: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub adapters: AdaptersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub timeout_disabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub ttl_secs: u64,
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdaptersConfig {
    /// Per-adapter timeout in milliseconds.
    pub timeouts: HashMap<String, u64>,
    /// Per-adapter retries beyond the first attempt.
    pub retries: HashMap<String, u32>,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Backend base URLs. An adapter without an endpoint is not started,
    /// except memory, which falls back to the in-process store.
    #[serde(default)]
    pub endpoints: HashMap<String, String>,
    pub fetch_max_bytes: usize,
}

const ADAPTER_DEFAULTS: [(&str, u64, u32); 5] = [
    (adapters::SEARCH, 10_000, 2),
    (adapters::FETCH, 15_000, 2),
    (adapters::MEMORY, 5_000, 1),
    (adapters::VECTOR, 10_000, 2),
    (adapters::BROWSER, 30_000, 1),
];

/// Upper bound for `session.ttl_secs` (one year).
pub const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Timeout for an adapter the config does not mention.
const FALLBACK_TIMEOUT_MS: u64 = 10_000;

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.request_timeout_secs", 60)?
            .set_default("server.timeout_disabled", false)?
            .set_default("session.ttl_secs", 1800)?
            .set_default("session.cleanup_interval_secs", 60)?
            .set_default(
                "adapters.retry_base_delay_ms",
                adapters::retry::DEFAULT_BASE_DELAY_MS,
            )?
            .set_default(
                "adapters.retry_max_delay_ms",
                adapters::retry::DEFAULT_MAX_DELAY_MS,
            )?
            .set_default(
                "adapters.fetch_max_bytes",
                adapters::fetch::DEFAULT_MAX_BYTES as u64,
            )?;
        for (name, timeout_ms, retries) in ADAPTER_DEFAULTS {
            builder = builder
                .set_default(format!("adapters.timeouts.{name}"), timeout_ms)?
                .set_default(format!("adapters.retries.{name}"), retries)?;
        }

        // An explicit file must exist; the implicit one is optional.
        match &cli.config {
            Some(path) => builder = builder.add_source(File::with_name(path).required(true)),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false));
            }
            None => {}
        }

        // MCP_SERVER__PORT=8000, MCP_ADAPTERS__ENDPOINTS__SEARCH=http://...
        builder = builder.add_source(
            Environment::with_prefix("MCP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(ttl) = cli.session_ttl_secs {
            builder = builder.set_override("session.ttl_secs", ttl)?;
        }
        if let Some(disabled) = cli.timeout_disabled {
            builder = builder.set_override("server.timeout_disabled", disabled)?;
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.session.ttl_secs == 0 {
            return Err(config::ConfigError::Message(
                "session.ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.session.ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(config::ConfigError::Message(format!(
                "session.ttl_secs must be at most {MAX_SESSION_TTL_SECS}"
            )));
        }
        if self.session.cleanup_interval_secs == 0 {
            return Err(config::ConfigError::Message(
                "session.cleanup_interval_secs must be greater than zero".to_string(),
            ));
        }
        if let Some((name, _)) = self.adapters.timeouts.iter().find(|(_, ms)| **ms == 0) {
            return Err(config::ConfigError::Message(format!(
                "adapters.timeouts.{name} must be greater than zero"
            )));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl AdaptersConfig {
    /// Timeout and retry budget for `name`.
    pub fn adapter_config(&self, name: &str) -> AdapterConfig {
        let timeout_ms = self
            .timeouts
            .get(name)
            .copied()
            .unwrap_or(FALLBACK_TIMEOUT_MS);
        let retries = self.retries.get(name).copied().unwrap_or(0);
        AdapterConfig::new(name, Duration::from_millis(timeout_ms), retries)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_delays(self.retry_base_delay_ms, self.retry_max_delay_ms)
    }

    pub fn endpoint(&self, name: &str) -> Option<&str> {
        self.endpoints
            .get(name)
            .map(String::as_str)
            .filter(|url| !url.trim().is_empty())
    }
}
