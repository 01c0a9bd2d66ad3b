//! Web search through a SearXNG-compatible JSON endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::http::HttpBackend;
use super::{Adapter, AdapterConfig, SEARCH, optional_u64, required_str, unsupported};
use crate::mcp::error::{McpError, McpResult};

/// Results returned when the caller gives no `limit`.
pub const DEFAULT_LIMIT: usize = 10;
/// Hard cap on `limit`.
pub const MAX_LIMIT: usize = 50;

/// One trimmed search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct RawResults {
    #[serde(default)]
    results: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug)]
pub struct SearchAdapter {
    backend: HttpBackend,
}

impl SearchAdapter {
    pub fn new(endpoint: &str) -> McpResult<Self> {
        Ok(Self {
            backend: HttpBackend::new(SEARCH, endpoint)?,
        })
    }

    async fn search(&self, args: &Value) -> McpResult<Value> {
        let query = required_str(SEARCH, args, "query")?;
        let limit = optional_u64(SEARCH, args, "limit")?
            .map_or(DEFAULT_LIMIT, |n| usize::try_from(n).unwrap_or(MAX_LIMIT))
            .clamp(1, MAX_LIMIT);

        let request = self
            .backend
            .client()
            .get(self.backend.endpoint(&["search"]))
            .query(&[("q", query), ("format", "json")]);
        let raw = self.backend.send_json(request).await?;
        let hits = shape_results(raw, limit)?;
        debug!(name: "adapter.search.results", query, hits = hits.len(), "Search completed");

        Ok(json!({
            "query": query,
            "total": hits.len(),
            "results": hits,
        }))
    }
}

/// Keep the first `limit` hits that carry a URL.
pub(crate) fn shape_results(raw: Value, limit: usize) -> McpResult<Vec<SearchHit>> {
    let parsed: RawResults = serde_json::from_value(raw)
        .map_err(|e| McpError::adapter(SEARCH, format!("unexpected response shape: {e}")))?;

    Ok(parsed
        .results
        .into_iter()
        .filter_map(|hit| {
            let url = hit.url.filter(|u| !u.is_empty())?;
            Some(SearchHit {
                title: hit.title.unwrap_or_else(|| url.clone()),
                url,
                content: hit.content.unwrap_or_default(),
            })
        })
        .take(limit)
        .collect())
}

#[async_trait]
impl Adapter for SearchAdapter {
    fn name(&self) -> &str {
        SEARCH
    }

    fn defaults(&self) -> AdapterConfig {
        AdapterConfig::new(SEARCH, Duration::from_secs(10), 2)
    }

    async fn connect(&self) -> McpResult<()> {
        self.backend.probe(&[]).await
    }

    async fn execute(&self, operation: &str, args: Value) -> McpResult<Value> {
        match operation {
            "search" => self.search(&args).await,
            other => Err(unsupported(SEARCH, other)),
        }
    }
}
