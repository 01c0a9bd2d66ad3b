//! Parameter validation against JSON-Schema-like descriptors.
//!
//! Only the shallow subset used by command registrations is checked: the
//! top-level `required` list and the declared `type` of each property that is
//! present. Nested schemas, formats, and ranges are not interpreted.

use serde_json::{Map, Value, json};

use super::error::McpError;
use super::protocol::json_type_name;

/// Schema accepting any parameters.
pub fn any_object() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// Validates `parameters` against `schema`.
pub fn validate_parameters(schema: &Value, parameters: &Map<String, Value>) -> Result<(), McpError> {
    let Some(schema) = schema.as_object() else {
        return Ok(());
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            match parameters.get(field) {
                None | Some(Value::Null) => {
                    return Err(McpError::validation(format!(
                        "missing required parameter: {field}"
                    )));
                }
                Some(_) => {}
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (name, property) in properties {
            let Some(value) = parameters.get(name) else {
                continue;
            };
            if let Some(expected) = property.get("type") {
                check_type(name, expected, value)?;
            }
        }
    }

    Ok(())
}

fn check_type(name: &str, expected: &Value, value: &Value) -> Result<(), McpError> {
    // `type` may be a single name or a list of alternatives.
    let allowed: Vec<&str> = match expected {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => return Ok(()),
    };

    if allowed.iter().any(|ty| matches_type(ty, value)) {
        return Ok(());
    }

    Err(McpError::validation(format!(
        "parameter '{name}' must be of type {}, got {}",
        allowed.join(" | "),
        json_type_name(value)
    )))
}

fn matches_type(ty: &str, value: &Value) -> bool {
    match ty {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        // Unknown type names are not enforced.
        _ => true,
    }
}
