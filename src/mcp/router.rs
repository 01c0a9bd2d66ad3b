//! Command dispatch: session resolution, validation, handler execution.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::error::{McpError, McpResult};
use super::protocol::{Command, Response, build_response, parse_command};
use super::registry::{CommandHandler, CommandRegistration, CommandRegistry, SessionContext};
use super::schema::validate_parameters;
use crate::session::{Session, SessionStore};

/// Routes validated commands to their handlers.
#[derive(Debug, Clone)]
pub struct CommandRouter {
    commands: CommandRegistry,
    sessions: SessionStore,
}

impl CommandRouter {
    pub fn new(commands: CommandRegistry, sessions: SessionStore) -> Self {
        Self { commands, sessions }
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Register `handler` under `name` with the given parameter schema and
    /// description.
    pub fn register_command(
        &self,
        name: &str,
        handler: Arc<dyn CommandHandler>,
        schema: Value,
        description: &str,
    ) -> McpResult<()> {
        self.commands.register(
            CommandRegistration::new(name, handler)
                .with_schema(schema)
                .with_description(description),
        )
    }

    pub fn unregister_command(&self, name: &str) -> bool {
        self.commands.unregister(name)
    }

    /// Parse a raw envelope and handle it.
    pub async fn dispatch(&self, raw: &Value) -> McpResult<Response> {
        let command = parse_command(raw)?;
        self.handle_command(command).await
    }

    /// Run one command.
    ///
    /// Only an unknown command name fails the call itself. Every other
    /// failure, including a panicking handler, is reported inside the
    /// returned [`Response`].
    #[instrument(
        name = "mcp.command",
        skip(self, command),
        fields(command = %command.command, command_id = %command.id)
    )]
    pub async fn handle_command(&self, command: Command) -> McpResult<Response> {
        let started = Instant::now();

        // Looked up first so unknown commands never create sessions.
        let Some(registration) = self.commands.get(&command.command) else {
            record(&command.command, "not_found", started, false);
            warn!(name: "mcp.command.not_found", command = %command.command, "Unknown command");
            return Err(McpError::command_not_found(&command.command));
        };
        let session = self.resolve_session(&command.session_id);

        let outcome = match validate_parameters(&registration.schema, &command.parameters) {
            Ok(()) => {
                let ctx = SessionContext::new(session.clone(), self.sessions.clone());
                run_handler(registration.handler.as_ref(), &command, &ctx).await
            }
            Err(err) => Err(err),
        };

        match &outcome {
            Ok(_) => {
                record(&command.command, "ok", started, true);
                info!(
                    name: "mcp.command.dispatched",
                    session_id = %session.id,
                    elapsed_ms = started.elapsed().as_millis(),
                    "Command completed"
                );
            }
            Err(err) => {
                record(&command.command, err.kind_name(), started, true);
                warn!(
                    name: "mcp.command.failed",
                    session_id = %session.id,
                    error.kind = err.kind_name(),
                    error = %err,
                    "Command failed"
                );
            }
        }

        Ok(build_response(&command, &session.id, outcome))
    }

    /// Touch an existing session or start a new one.
    fn resolve_session(&self, requested: &str) -> Session {
        if let Some(session) = self.sessions.get_and_touch(requested) {
            return session;
        }
        let session = self.sessions.create_session(Map::new());
        debug!(
            name: "mcp.session.replaced",
            requested = %requested,
            session_id = %session.id,
            "Unknown session; started a new one"
        );
        session
    }
}

async fn run_handler(
    handler: &dyn CommandHandler,
    command: &Command,
    ctx: &SessionContext,
) -> McpResult<Value> {
    match AssertUnwindSafe(handler.handle(command, ctx))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(payload) => Err(McpError::internal(format!(
            "handler panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

fn record(command: &str, outcome: &'static str, started: Instant, known: bool) {
    // Unknown names are caller input; keep them out of metric labels.
    let label = if known { command.to_string() } else { "unknown".to_string() };
    metrics::counter!("mcp_commands_total", "command" => label.clone(), "outcome" => outcome)
        .increment(1);
    metrics::histogram!("mcp_command_duration_seconds", "command" => label)
        .record(started.elapsed().as_secs_f64());
}
