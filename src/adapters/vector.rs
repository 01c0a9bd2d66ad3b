//! Vector store client for a Qdrant-compatible REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::http::HttpBackend;
use super::{Adapter, AdapterConfig, VECTOR, optional_u64, required_str, unsupported};
use crate::mcp::error::{McpError, McpResult};

const DEFAULT_QUERY_LIMIT: u64 = 5;

/// A point as sent to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: Value,
    pub vector: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// A scored search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: Value,
    pub score: f32,
    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Debug)]
pub struct VectorAdapter {
    backend: HttpBackend,
}

impl VectorAdapter {
    pub fn new(endpoint: &str) -> McpResult<Self> {
        Ok(Self {
            backend: HttpBackend::new(VECTOR, endpoint)?,
        })
    }

    async fn upsert(&self, args: &Value) -> McpResult<Value> {
        let collection = required_str(VECTOR, args, "collection")?;
        let points = parse_points(args)?;
        let count = points.len();

        let url = self.backend.endpoint(&["collections", collection, "points"]);
        let request = self
            .backend
            .client()
            .put(url)
            .query(&[("wait", "true")])
            .json(&json!({ "points": points }));
        let body = self.backend.send_json(request).await?;

        Ok(json!({
            "collection": collection,
            "upserted": count,
            "status": body.pointer("/result/status").cloned().unwrap_or(Value::Null),
        }))
    }

    async fn query(&self, args: &Value) -> McpResult<Value> {
        let collection = required_str(VECTOR, args, "collection")?;
        let vector = parse_vector(args.get("vector"))?;
        let limit = optional_u64(VECTOR, args, "limit")?.unwrap_or(DEFAULT_QUERY_LIMIT);

        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(filter) = args.get("filter").filter(|f| !f.is_null()) {
            body["filter"] = filter.clone();
        }

        let url = self
            .backend
            .endpoint(&["collections", collection, "points", "search"]);
        let raw = self
            .backend
            .send_json(self.backend.client().post(url).json(&body))
            .await?;
        let parsed: SearchBody = serde_json::from_value(raw)
            .map_err(|e| McpError::adapter(VECTOR, format!("unexpected response shape: {e}")))?;

        Ok(json!({
            "collection": collection,
            "matches": parsed.result,
        }))
    }

    async fn delete(&self, args: &Value) -> McpResult<Value> {
        let collection = required_str(VECTOR, args, "collection")?;
        let ids = match args.get("ids") {
            Some(Value::Array(ids)) if !ids.is_empty() => ids.clone(),
            _ => {
                return Err(McpError::validation(format!(
                    "{VECTOR}: argument 'ids' must be a non-empty array"
                )));
            }
        };
        let count = ids.len();

        let url = self
            .backend
            .endpoint(&["collections", collection, "points", "delete"]);
        let request = self
            .backend
            .client()
            .post(url)
            .query(&[("wait", "true")])
            .json(&json!({ "points": ids }));
        self.backend.send_json(request).await?;

        Ok(json!({ "collection": collection, "deleted": count }))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn parse_vector(raw: Option<&Value>) -> McpResult<Vec<f32>> {
    let invalid = || McpError::validation(format!("{VECTOR}: 'vector' must be a non-empty array of numbers"));
    let items = raw.and_then(Value::as_array).ok_or_else(invalid)?;
    if items.is_empty() {
        return Err(invalid());
    }
    items
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32).ok_or_else(invalid))
        .collect()
}

fn parse_points(args: &Value) -> McpResult<Vec<Point>> {
    let items = match args.get("points") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => {
            return Err(McpError::validation(format!(
                "{VECTOR}: argument 'points' must be a non-empty array"
            )));
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let id = match item.get("id") {
                Some(id @ (Value::String(_) | Value::Number(_))) => id.clone(),
                _ => {
                    return Err(McpError::validation(format!(
                        "{VECTOR}: point {i} needs a string or integer 'id'"
                    )));
                }
            };
            Ok(Point {
                id,
                vector: parse_vector(item.get("vector"))?,
                payload: item.get("payload").filter(|p| !p.is_null()).cloned(),
            })
        })
        .collect()
}

#[async_trait]
impl Adapter for VectorAdapter {
    fn name(&self) -> &str {
        VECTOR
    }

    fn defaults(&self) -> AdapterConfig {
        AdapterConfig::new(VECTOR, Duration::from_secs(10), 2)
    }

    async fn connect(&self) -> McpResult<()> {
        self.backend.probe(&["collections"]).await
    }

    async fn execute(&self, operation: &str, args: Value) -> McpResult<Value> {
        match operation {
            "upsert" => self.upsert(&args).await,
            "query" => self.query(&args).await,
            "delete" => self.delete(&args).await,
            other => Err(unsupported(VECTOR, other)),
        }
    }
}
