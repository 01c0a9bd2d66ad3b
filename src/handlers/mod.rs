//! Built-in commands.
//!
//! - `system.ping`, `system.info`
//! - `session.get`, `session.set`
//! - one command per adapter operation (`search`, `memory.get`, ...)
//! - `content.stats`
//!
//! Adapter-backed commands are only registered when their adapter is.

pub mod adapters;
pub mod content;
pub mod session;
pub mod system;

use std::sync::Arc;

use serde_json::json;

use crate::adapters::{AdapterRegistry, FETCH};
use crate::mcp::schema::any_object;
use crate::mcp::{CommandRouter, McpResult};

use self::adapters::{ADAPTER_COMMANDS, AdapterCommand, TIMEOUT_PARAM};

/// Register every built-in command on `router`.
pub fn register_builtin_commands(
    router: &CommandRouter,
    adapter_registry: &AdapterRegistry,
) -> McpResult<()> {
    router.register_command("system.ping", Arc::new(system::Ping), any_object(), "Liveness check")?;
    router.register_command(
        "system.info",
        Arc::new(system::Info::new(
            router.commands().clone(),
            adapter_registry.clone(),
        )),
        any_object(),
        "Server version, uptime, commands and adapter states",
    )?;

    router.register_command(
        "session.get",
        Arc::new(session::GetSession),
        any_object(),
        "Current session snapshot",
    )?;
    router.register_command(
        "session.set",
        Arc::new(session::SetSessionValues),
        json!({
            "type": "object",
            "properties": { "values": {"type": "object"} },
            "required": ["values"]
        }),
        "Merge values into session state",
    )?;

    for spec in ADAPTER_COMMANDS {
        if !adapter_registry.contains(spec.adapter) {
            continue;
        }
        router.register_command(
            spec.command,
            Arc::new(AdapterCommand::new(*spec, adapter_registry.clone())),
            spec.schema(),
            spec.description,
        )?;
    }

    if adapter_registry.contains(FETCH) {
        router.register_command(
            "content.stats",
            Arc::new(content::ContentStats::new(adapter_registry.clone())),
            content_stats_schema(),
            "Fetch a URL and count characters, words and lines",
        )?;
    }

    Ok(())
}

fn content_stats_schema() -> serde_json::Value {
    let mut schema = json!({
        "type": "object",
        "properties": { "url": {"type": "string"} },
        "required": ["url"]
    });
    schema["properties"][TIMEOUT_PARAM] = json!({"type": "integer"});
    schema
}
