//! Envelope parsing and response construction.
//!
//! Inbound envelopes are arbitrary JSON values; [`parse_command`] is the only
//! way to obtain a [`Command`], so every command in the system has already
//! passed the structural checks below.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::error::McpError;

/// A validated inbound command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub id: String,
    pub command: String,
    pub session_id: String,
    pub parameters: Map<String, Value>,
    /// RFC 3339 creation time.
    pub timestamp: String,
}

impl Command {
    /// Looks up a single parameter.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    /// Looks up a string parameter.
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}

/// Error payload of a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl From<&McpError> for ErrorBody {
    fn from(err: &McpError) -> Self {
        Self {
            kind: err.kind_name().to_string(),
            message: err.to_string(),
        }
    }
}

/// Outbound response envelope. Exactly one of `result`/`error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub timestamp: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Parses a raw envelope into a [`Command`].
///
/// The envelope must be a JSON object with non-empty string `command` and
/// `sessionId` fields. `parameters` may be omitted or `null` (treated as an
/// empty object) but must otherwise be an object.
pub fn parse_command(raw: &Value) -> Result<Command, McpError> {
    let Value::Object(envelope) = raw else {
        return Err(McpError::validation(format!(
            "command envelope must be a JSON object, got {}",
            json_type_name(raw)
        )));
    };

    let command = required_string(envelope, "command")?;
    let session_id = required_string(envelope, "sessionId")?;

    let parameters = match envelope.get("parameters") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            return Err(McpError::validation(format!(
                "parameters must be an object, got {}",
                json_type_name(other)
            )));
        }
    };

    Ok(Command {
        id: Uuid::new_v4().to_string(),
        command,
        session_id,
        parameters,
        timestamp: now_rfc3339(),
    })
}

fn required_string(envelope: &Map<String, Value>, field: &str) -> Result<String, McpError> {
    match envelope.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(McpError::validation(format!("{field} must not be empty"))),
        Some(other) => Err(McpError::validation(format!(
            "{field} must be a string, got {}",
            json_type_name(other)
        ))),
        None => Err(McpError::validation(format!("missing required field: {field}"))),
    }
}

/// Builds the response for `command`, answering on `session_id`.
///
/// `session_id` is passed separately because the router may have replaced an
/// unknown caller-supplied id with a freshly created session.
pub fn build_response(
    command: &Command,
    session_id: &str,
    outcome: Result<Value, McpError>,
) -> Response {
    let (result, error) = match outcome {
        Ok(value) => (Some(value), None),
        Err(err) => (None, Some(ErrorBody::from(&err))),
    };

    Response {
        id: command.id.clone(),
        session_id: session_id.to_string(),
        result,
        error,
        timestamp: now_rfc3339(),
    }
}

/// JSON-ish name of a value's type, used in validation messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_malformed_envelopes() {
        let cases = [
            Value::Null,
            json!("observe"),
            json!(42),
            json!([{"command": "x", "sessionId": "y"}]),
            json!({}),
            json!({"sessionId": "s1"}),
            json!({"command": "system.ping"}),
            json!({"command": "", "sessionId": "s1"}),
            json!({"command": "system.ping", "sessionId": ""}),
            json!({"command": 7, "sessionId": "s1"}),
            json!({"command": "system.ping", "sessionId": null}),
        ];

        for raw in cases {
            let err = parse_command(&raw).expect_err(&format!("{raw} should be rejected"));
            assert_eq!(err.kind_name(), "ValidationError", "{raw}");
        }
    }

    #[test]
    fn parses_valid_envelope() {
        let raw = json!({
            "command": "search",
            "sessionId": "abc",
            "parameters": {"query": "rust", "limit": 3}
        });
        let cmd = parse_command(&raw).expect("valid envelope");

        assert!(!cmd.id.is_empty());
        assert!(!cmd.timestamp.is_empty());
        assert_eq!(cmd.command, "search");
        assert_eq!(cmd.session_id, "abc");
        assert_eq!(Value::Object(cmd.parameters.clone()), raw["parameters"]);
        assert_eq!(cmd.str_param("query"), Some("rust"));
    }

    #[test]
    fn defaults_parameters_to_empty_object() {
        let missing = parse_command(&json!({"command": "a", "sessionId": "b"})).unwrap();
        assert!(missing.parameters.is_empty());

        let null = parse_command(&json!({"command": "a", "sessionId": "b", "parameters": null}))
            .unwrap();
        assert!(null.parameters.is_empty());
    }

    #[test]
    fn rejects_non_object_parameters() {
        let err = parse_command(&json!({"command": "a", "sessionId": "b", "parameters": [1, 2]}))
            .unwrap_err();
        assert!(err.to_string().contains("parameters"));
    }

    #[test]
    fn generated_ids_are_unique() {
        let raw = json!({"command": "a", "sessionId": "b"});
        let first = parse_command(&raw).unwrap();
        let second = parse_command(&raw).unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn success_response_omits_error_key() {
        let cmd = parse_command(&json!({"command": "a", "sessionId": "b"})).unwrap();
        let response = build_response(&cmd, "b", Ok(json!({"ok": true})));

        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["id"], json!(cmd.id));
        assert_eq!(wire["sessionId"], json!("b"));
        assert_eq!(wire["result"], json!({"ok": true}));
        assert!(wire.get("error").is_none());
        assert!(wire["timestamp"].is_string());
    }

    #[test]
    fn failure_response_carries_kind_and_message() {
        let cmd = parse_command(&json!({"command": "a", "sessionId": "b"})).unwrap();
        let response = build_response(&cmd, "fresh", Err(McpError::internal("Test error")));

        let wire = serde_json::to_value(&response).unwrap();
        assert!(wire.get("result").is_none());
        assert_eq!(wire["sessionId"], json!("fresh"));
        assert_eq!(wire["error"]["type"], json!("Error"));
        assert_eq!(wire["error"]["message"], json!("Test error"));
    }
}
