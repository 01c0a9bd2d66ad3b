//! `session.*` commands operating on the caller's own session.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::mcp::{Command, CommandHandler, McpError, McpResult, SessionContext};

#[derive(Debug)]
pub struct GetSession;

#[async_trait]
impl CommandHandler for GetSession {
    async fn handle(&self, _command: &Command, session: &SessionContext) -> McpResult<Value> {
        Ok(serde_json::to_value(session.session())?)
    }
}

/// Merges the `values` object into session state.
#[derive(Debug)]
pub struct SetSessionValues;

#[async_trait]
impl CommandHandler for SetSessionValues {
    async fn handle(&self, command: &Command, session: &SessionContext) -> McpResult<Value> {
        let Some(Value::Object(values)) = command.param("values") else {
            return Err(McpError::validation("parameter 'values' must be an object"));
        };
        let keys: Vec<_> = values.keys().cloned().collect();
        let updated = session.update_state(values.clone())?;
        Ok(json!({
            "updated": keys,
            "state": updated.state,
        }))
    }
}
