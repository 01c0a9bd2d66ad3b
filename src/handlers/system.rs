//! `system.*` commands.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

use crate::adapters::AdapterRegistry;
use crate::mcp::{Command, CommandHandler, CommandRegistry, McpResult, SessionContext};

#[derive(Debug)]
pub struct Ping;

#[async_trait]
impl CommandHandler for Ping {
    async fn handle(&self, _command: &Command, _session: &SessionContext) -> McpResult<Value> {
        Ok(json!({ "pong": true, "time": Utc::now().to_rfc3339() }))
    }
}

/// Version, uptime, registered commands and adapter states.
#[derive(Debug)]
pub struct Info {
    started: Instant,
    commands: CommandRegistry,
    adapters: AdapterRegistry,
}

impl Info {
    pub fn new(commands: CommandRegistry, adapters: AdapterRegistry) -> Self {
        Self {
            started: Instant::now(),
            commands,
            adapters,
        }
    }
}

#[async_trait]
impl CommandHandler for Info {
    async fn handle(&self, _command: &Command, _session: &SessionContext) -> McpResult<Value> {
        Ok(json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "uptimeSecs": self.started.elapsed().as_secs(),
            "commands": self.commands.names(),
            "adapters": self.adapters.statuses(),
        }))
    }
}
