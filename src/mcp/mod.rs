//! Model Context Protocol (MCP) command core.
//!
//! Callers send JSON command envelopes:
//!
//! ```json
//! { "command": "search", "sessionId": "…", "parameters": { "query": "tokio" } }
//! ```
//!
//! and receive a response envelope carrying either `result` or
//! `error: { type, message }`.
//!
//! # Architecture
//!
//! - [`protocol`]: envelope parsing and response construction
//! - [`schema`]: shallow parameter validation
//! - [`registry`]: runtime command registration
//! - [`router`]: session resolution and handler dispatch
//! - [`error`]: the error taxonomy shared with the adapter layer

pub mod error;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod schema;

pub use error::{ErrorKind, McpError, McpResult};
pub use protocol::{Command, ErrorBody, Response, build_response, parse_command};
pub use registry::{
    CommandHandler, CommandInfo, CommandRegistration, CommandRegistry, SessionContext, handler_fn,
};
pub use router::CommandRouter;
