//! Dynamic command registry.
//!
//! Commands are registered at runtime under a unique name together with the
//! handler that runs them, a parameter schema, and a human description.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::error::{McpError, McpResult};
use super::protocol::Command;
use super::schema::any_object;
use crate::session::{Session, SessionStore};

/// The session a handler runs in.
///
/// Holds the snapshot taken when the command was dispatched plus a handle to
/// the store, so handlers can write state back.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session: Session,
    store: SessionStore,
}

impl SessionContext {
    pub fn new(session: Session, store: SessionStore) -> Self {
        Self { session, store }
    }

    pub fn id(&self) -> &str {
        &self.session.id
    }

    /// Snapshot taken at dispatch time.
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.session.state.get(key)
    }

    /// Shallow-merge `patch` into the stored session.
    pub fn update_state(&self, patch: Map<String, Value>) -> McpResult<Session> {
        self.store.update_state(&self.session.id, patch)
    }

    /// Set a single state key.
    pub fn set(&self, key: impl Into<String>, value: Value) -> McpResult<Session> {
        let mut patch = Map::new();
        patch.insert(key.into(), value);
        self.update_state(patch)
    }
}

/// Executes one command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: &Command, session: &SessionContext) -> McpResult<Value>;
}

/// Handler built from an async closure.
struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(Command, SessionContext) -> Fut + Send + Sync,
    Fut: Future<Output = McpResult<Value>> + Send + 'static,
{
    async fn handle(&self, command: &Command, session: &SessionContext) -> McpResult<Value> {
        (self.f)(command.clone(), session.clone()).await
    }
}

/// Wrap an async closure as a [`CommandHandler`].
///
/// ```rust
/// use mcp_gateway::mcp::handler_fn;
/// use serde_json::json;
///
/// let echo = handler_fn(|command, _session| async move {
///     Ok(json!({ "echo": command.parameters }))
/// });
/// # let _ = echo;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn CommandHandler>
where
    F: Fn(Command, SessionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = McpResult<Value>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

/// A registered command.
#[derive(Clone)]
pub struct CommandRegistration {
    pub name: String,
    pub description: String,
    pub schema: Value,
    pub handler: Arc<dyn CommandHandler>,
}

impl std::fmt::Debug for CommandRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistration")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl CommandRegistration {
    /// Registration with an empty description and a schema accepting any
    /// parameters.
    pub fn new(name: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            schema: any_object(),
            handler,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }
}

/// Public listing entry for a command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandInfo {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

/// Thread-safe name -> registration map, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: Arc<RwLock<HashMap<String, Arc<CommandRegistration>>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command. Empty names are rejected with `ValidationError`, taken
    /// names with `ConflictError`.
    pub fn register(&self, registration: CommandRegistration) -> McpResult<()> {
        if registration.name.trim().is_empty() {
            return Err(McpError::validation("command name must not be empty"));
        }

        let mut commands = self.commands.write().unwrap_or_else(PoisonError::into_inner);
        if commands.contains_key(&registration.name) {
            return Err(McpError::conflict(format!(
                "Command already registered: {}",
                registration.name
            )));
        }
        info!(name: "mcp.command.registered", command = %registration.name, "Command registered");
        commands.insert(registration.name.clone(), Arc::new(registration));
        Ok(())
    }

    /// Remove a command. Returns whether it was present.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self
            .commands
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some();
        if removed {
            debug!(name: "mcp.command.unregistered", command = %name, "Command unregistered");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<CommandRegistration>> {
        self.commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sorted command names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Every command with its metadata, sorted by name.
    pub fn list(&self) -> Vec<CommandInfo> {
        let mut infos: Vec<_> = self
            .commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|r| CommandInfo {
                name: r.name.clone(),
                description: r.description.clone(),
                schema: r.schema.clone(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn len(&self) -> usize {
        self.commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> Arc<dyn CommandHandler> {
        handler_fn(|_command, _session| async { Ok(Value::Null) })
    }

    #[test]
    fn test_register_and_list() {
        let registry = CommandRegistry::new();
        registry
            .register(
                CommandRegistration::new("b.cmd", noop())
                    .with_description("second")
                    .with_schema(json!({"type": "object", "required": ["x"]})),
            )
            .unwrap();
        registry
            .register(CommandRegistration::new("a.cmd", noop()))
            .unwrap();

        assert_eq!(registry.names(), vec!["a.cmd", "b.cmd"]);
        let listed = registry.list();
        assert_eq!(listed[1].description, "second");
        assert_eq!(listed[1].schema["required"], json!(["x"]));
        assert_eq!(listed[0].schema, any_object());
    }

    #[test]
    fn test_duplicate_name_conflicts() {
        let registry = CommandRegistry::new();
        registry.register(CommandRegistration::new("dup", noop())).unwrap();

        let err = registry
            .register(CommandRegistration::new("dup", noop()))
            .unwrap_err();
        assert_eq!(err.kind_name(), "ConflictError");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let registry = CommandRegistry::new();
        let err = registry
            .register(CommandRegistration::new("  ", noop()))
            .unwrap_err();
        assert_eq!(err.kind_name(), "ValidationError");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregister() {
        let registry = CommandRegistry::new();
        registry.register(CommandRegistration::new("gone", noop())).unwrap();

        assert!(registry.unregister("gone"));
        assert!(!registry.unregister("gone"));
        assert!(registry.get("gone").is_none());

        // The name can be reused afterwards.
        registry.register(CommandRegistration::new("gone", noop())).unwrap();
    }

    #[tokio::test]
    async fn test_session_context_writes_through() {
        let store = SessionStore::default();
        let session = store.create_session(Map::new());
        let ctx = SessionContext::new(session.clone(), store.clone());

        ctx.set("topic", json!("rust")).unwrap();

        assert_eq!(store.get_session(&session.id).unwrap().state["topic"], json!("rust"));
        // The snapshot is not refreshed.
        assert!(ctx.get("topic").is_none());
    }
}
