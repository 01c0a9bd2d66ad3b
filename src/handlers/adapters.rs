//! Commands that forward to a backend adapter.
//!
//! Each command maps to one adapter operation. Parameters are passed through
//! as the operation's arguments, except `timeoutMs`, which overrides the
//! adapter's timeout for that call.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::adapters::{self, AdapterRegistry, CallOptions};
use crate::mcp::{Command, CommandHandler, McpError, McpResult, SessionContext};

/// Parameter carrying the per-call timeout override.
pub const TIMEOUT_PARAM: &str = "timeoutMs";

/// Static description of an adapter-backed command.
#[derive(Debug, Clone, Copy)]
pub struct AdapterCommandSpec {
    pub command: &'static str,
    pub adapter: &'static str,
    pub operation: &'static str,
    pub description: &'static str,
}

pub const ADAPTER_COMMANDS: &[AdapterCommandSpec] = &[
    AdapterCommandSpec {
        command: "search",
        adapter: adapters::SEARCH,
        operation: "search",
        description: "Search the web",
    },
    AdapterCommandSpec {
        command: "fetch",
        adapter: adapters::FETCH,
        operation: "fetch",
        description: "Fetch a URL over HTTP(S)",
    },
    AdapterCommandSpec {
        command: "memory.get",
        adapter: adapters::MEMORY,
        operation: "get",
        description: "Read a value from memory",
    },
    AdapterCommandSpec {
        command: "memory.set",
        adapter: adapters::MEMORY,
        operation: "set",
        description: "Store a value in memory",
    },
    AdapterCommandSpec {
        command: "memory.delete",
        adapter: adapters::MEMORY,
        operation: "delete",
        description: "Remove a value from memory",
    },
    AdapterCommandSpec {
        command: "memory.list",
        adapter: adapters::MEMORY,
        operation: "list",
        description: "List memory keys",
    },
    AdapterCommandSpec {
        command: "vector.upsert",
        adapter: adapters::VECTOR,
        operation: "upsert",
        description: "Insert or replace vectors",
    },
    AdapterCommandSpec {
        command: "vector.query",
        adapter: adapters::VECTOR,
        operation: "query",
        description: "Nearest-neighbour search",
    },
    AdapterCommandSpec {
        command: "vector.delete",
        adapter: adapters::VECTOR,
        operation: "delete",
        description: "Delete vectors by id",
    },
    AdapterCommandSpec {
        command: "browser.content",
        adapter: adapters::BROWSER,
        operation: "content",
        description: "Render a page in a headless browser",
    },
    AdapterCommandSpec {
        command: "browser.screenshot",
        adapter: adapters::BROWSER,
        operation: "screenshot",
        description: "Screenshot a page as base64 PNG",
    },
];

impl AdapterCommandSpec {
    /// Parameter schema for the command.
    pub fn schema(&self) -> Value {
        let (properties, required) = match self.command {
            "search" => (
                json!({ "query": {"type": "string"}, "limit": {"type": "integer"} }),
                json!(["query"]),
            ),
            "fetch" | "browser.content" => (json!({ "url": {"type": "string"} }), json!(["url"])),
            "browser.screenshot" => (
                json!({ "url": {"type": "string"}, "fullPage": {"type": "boolean"} }),
                json!(["url"]),
            ),
            "memory.get" | "memory.delete" => {
                (json!({ "key": {"type": "string"} }), json!(["key"]))
            }
            "memory.set" => (json!({ "key": {"type": "string"} }), json!(["key", "value"])),
            "memory.list" => (json!({ "prefix": {"type": "string"} }), json!([])),
            "vector.upsert" => (
                json!({ "collection": {"type": "string"}, "points": {"type": "array"} }),
                json!(["collection", "points"]),
            ),
            "vector.query" => (
                json!({
                    "collection": {"type": "string"},
                    "vector": {"type": "array"},
                    "limit": {"type": "integer"},
                    "filter": {"type": ["object", "null"]}
                }),
                json!(["collection", "vector"]),
            ),
            "vector.delete" => (
                json!({ "collection": {"type": "string"}, "ids": {"type": "array"} }),
                json!(["collection", "ids"]),
            ),
            _ => (json!({}), json!([])),
        };

        let mut properties = properties;
        if let Value::Object(map) = &mut properties {
            map.insert(TIMEOUT_PARAM.to_string(), json!({"type": "integer"}));
        }
        json!({ "type": "object", "properties": properties, "required": required })
    }
}

/// Split the timeout override out of the command parameters.
pub fn split_call_options(parameters: &Map<String, Value>) -> McpResult<(Value, CallOptions)> {
    let mut args = parameters.clone();
    let timeout = match args.remove(TIMEOUT_PARAM) {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_u64() {
            Some(ms) if ms > 0 => Some(Duration::from_millis(ms)),
            _ => {
                return Err(McpError::validation(format!(
                    "parameter '{TIMEOUT_PARAM}' must be a positive integer"
                )));
            }
        },
    };
    Ok((Value::Object(args), CallOptions { timeout }))
}

/// Forwards a command to `spec.adapter`.
#[derive(Debug)]
pub struct AdapterCommand {
    spec: AdapterCommandSpec,
    adapters: AdapterRegistry,
}

impl AdapterCommand {
    pub fn new(spec: AdapterCommandSpec, adapters: AdapterRegistry) -> Self {
        Self { spec, adapters }
    }
}

#[async_trait]
impl CommandHandler for AdapterCommand {
    async fn handle(&self, command: &Command, _session: &SessionContext) -> McpResult<Value> {
        let (args, options) = split_call_options(&command.parameters)?;
        self.adapters
            .execute(self.spec.adapter, self.spec.operation, args, options)
            .await
    }
}
