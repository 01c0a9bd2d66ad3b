//! Per-caller session management.
//!
//! This module provides in-memory session storage for state that must
//! survive across commands from the same caller. Sessions are identified by
//! UUID, expire a fixed TTL after their last access, and are removed by a
//! periodic sweep.
//!
//! # Architecture
//!
//! - [`Session`]: Snapshot of one session's state and timestamps
//! - [`SessionStore`]: Thread-safe store owning every session
//!
//! # Example
//!
//! ```rust
//! use mcp_gateway::session::SessionStore;
//! use serde_json::{Map, json};
//!
//! let store = SessionStore::default();
//! let session = store.create_session(Map::new());
//!
//! let mut patch = Map::new();
//! patch.insert("topic".to_string(), json!("rust"));
//! let updated = store.update_state(&session.id, patch).unwrap();
//! assert_eq!(updated.state["topic"], "rust");
//! ```

mod store;

pub use store::{DEFAULT_SESSION_TTL, Session, SessionStore};
