//! Error taxonomy shared by the protocol, router, and adapter layers.
//!
//! Every failure that can reach a caller is an [`McpError`]. The variant
//! decides the wire-level `error.type` string (see [`ErrorKind::as_str`]),
//! whether the adapter wrapper may retry it, and how the HTTP transport maps
//! it to a status code.

use serde::Serialize;
use thiserror::Error;

/// Closed set of error kinds understood on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Malformed envelope or parameter-schema mismatch.
    #[serde(rename = "ValidationError")]
    Validation,
    /// Unknown command, missing key, or missing resource.
    #[serde(rename = "NotFoundError")]
    NotFound,
    /// Adapter not connected, transport failure, or retries exhausted.
    #[serde(rename = "ConnectionError")]
    Connection,
    /// An adapter call exceeded its time budget.
    #[serde(rename = "TimeoutError")]
    Timeout,
    /// A name is already taken.
    #[serde(rename = "ConflictError")]
    Conflict,
    /// A backend rejected a well-formed call.
    #[serde(rename = "AdapterError")]
    Adapter,
    /// Untyped handler failure.
    #[serde(rename = "Error")]
    Internal,
}

impl ErrorKind {
    /// Wire name carried in `error.type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::NotFound => "NotFoundError",
            Self::Connection => "ConnectionError",
            Self::Timeout => "TimeoutError",
            Self::Conflict => "ConflictError",
            Self::Adapter => "AdapterError",
            Self::Internal => "Error",
        }
    }

    /// Maps a wire name back to a kind. Unknown names map to `Internal`.
    pub fn from_wire(name: &str) -> Self {
        match name {
            "ValidationError" => Self::Validation,
            "NotFoundError" => Self::NotFound,
            "ConnectionError" => Self::Connection,
            "TimeoutError" => Self::Timeout,
            "ConflictError" => Self::Conflict,
            "AdapterError" => Self::Adapter,
            _ => Self::Internal,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the gateway core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum McpError {
    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    Connection { message: String },

    #[error("adapter '{adapter}' operation '{operation}' timed out after {timeout_ms} ms")]
    Timeout {
        adapter: String,
        operation: String,
        timeout_ms: u64,
    },

    #[error("{message}")]
    Conflict { message: String },

    #[error("{adapter}: {message}")]
    Adapter { adapter: String, message: String },

    #[error("{message}")]
    Internal { message: String },
}

impl McpError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// The router's hard failure for an unregistered command name.
    pub fn command_not_found(name: &str) -> Self {
        Self::not_found(format!("Command not found: {name}"))
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn timeout(adapter: impl Into<String>, operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            adapter: adapter.into(),
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn adapter(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Adapter {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Adapter { .. } => ErrorKind::Adapter,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Wire name of this error's kind.
    pub fn kind_name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Only connection-class failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

impl From<anyhow::Error> for McpError {
    fn from(err: anyhow::Error) -> Self {
        // A typed error smuggled through anyhow keeps its kind.
        match err.downcast::<McpError>() {
            Ok(inner) => inner,
            Err(other) => Self::internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation(err.to_string())
    }
}

/// Result alias used throughout the gateway.
pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_wire_taxonomy() {
        assert_eq!(McpError::validation("x").kind_name(), "ValidationError");
        assert_eq!(McpError::not_found("x").kind_name(), "NotFoundError");
        assert_eq!(McpError::connection("x").kind_name(), "ConnectionError");
        assert_eq!(McpError::timeout("a", "b", 1).kind_name(), "TimeoutError");
        assert_eq!(McpError::conflict("x").kind_name(), "ConflictError");
        assert_eq!(McpError::internal("x").kind_name(), "Error");
    }

    #[test]
    fn wire_names_map_back_to_kinds() {
        for kind in [
            ErrorKind::Validation,
            ErrorKind::NotFound,
            ErrorKind::Connection,
            ErrorKind::Timeout,
            ErrorKind::Conflict,
            ErrorKind::Adapter,
            ErrorKind::Internal,
        ] {
            assert_eq!(ErrorKind::from_wire(kind.as_str()), kind);
        }
        assert_eq!(ErrorKind::from_wire("TypeError"), ErrorKind::Internal);
    }

    #[test]
    fn only_connection_errors_are_retryable() {
        assert!(McpError::connection("reset").is_retryable());
        assert!(!McpError::validation("bad").is_retryable());
        assert!(!McpError::not_found("gone").is_retryable());
        assert!(!McpError::timeout("search", "search", 10).is_retryable());
        assert!(!McpError::adapter("search", "400").is_retryable());
    }

    #[test]
    fn timeout_message_names_adapter_and_operation() {
        let err = McpError::timeout("browser", "screenshot", 1500);
        let msg = err.to_string();
        assert!(msg.contains("browser"));
        assert!(msg.contains("screenshot"));
        assert!(msg.contains("1500"));
    }

    #[test]
    fn anyhow_preserves_typed_errors() {
        let wrapped = anyhow::Error::new(McpError::not_found("missing key"));
        assert_eq!(McpError::from(wrapped), McpError::not_found("missing key"));

        let plain = anyhow::anyhow!("Test error");
        let err = McpError::from(plain);
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.to_string(), "Test error");
    }
}
