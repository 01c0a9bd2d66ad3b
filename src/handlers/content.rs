//! `content.stats`: fetch a page and count what came back.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::adapters::split_call_options;
use crate::adapters::{self, AdapterRegistry};
use crate::mcp::{Command, CommandHandler, McpError, McpResult, SessionContext};

/// Session key holding the last URL fetched by `content.stats`.
pub const LAST_FETCHED_URL: &str = "lastFetchedUrl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextStats {
    pub characters: usize,
    pub words: usize,
    pub lines: usize,
}

impl TextStats {
    pub fn of(text: &str) -> Self {
        Self {
            characters: text.chars().count(),
            words: text.split_whitespace().count(),
            lines: text.lines().count(),
        }
    }
}

#[derive(Debug)]
pub struct ContentStats {
    adapters: AdapterRegistry,
}

impl ContentStats {
    pub fn new(adapters: AdapterRegistry) -> Self {
        Self { adapters }
    }
}

#[async_trait]
impl CommandHandler for ContentStats {
    async fn handle(&self, command: &Command, session: &SessionContext) -> McpResult<Value> {
        let (args, options) = split_call_options(&command.parameters)?;
        let url = command
            .str_param("url")
            .ok_or_else(|| McpError::validation("parameter 'url' must be a string"))?
            .to_string();

        let page = self
            .adapters
            .execute(adapters::FETCH, "fetch", args, options)
            .await?;
        let body = page.get("body").and_then(Value::as_str).unwrap_or_default();
        let stats = TextStats::of(body);

        session.set(LAST_FETCHED_URL, json!(url))?;

        Ok(json!({
            "url": url,
            "status": page.get("status").cloned().unwrap_or(Value::Null),
            "truncated": page.get("truncated").cloned().unwrap_or(json!(false)),
            "characters": stats.characters,
            "words": stats.words,
            "lines": stats.lines,
        }))
    }
}
