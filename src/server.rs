use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::adapters::AdapterStatus;
use crate::config::AppConfig;
use crate::mcp::{CommandInfo, ErrorBody, McpError, parse_command};
use crate::session::Session;
use crate::{AppState, build_adapter_registry, telemetry};

/// Request bodies larger than this are rejected.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Start the Axum server with the provided configuration.
///
/// Runs until Ctrl-C (or SIGTERM), then stops the session sweeper and
/// disconnects every adapter.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let metrics = match telemetry::install_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(name: "metrics.install.failed", error = %e, "Metrics recorder not installed");
            None
        }
    };

    let adapters = build_adapter_registry(&config.adapters)?;
    let failed = adapters.connect_all().await;
    info!(
        name: "adapters.connected",
        connected = ?adapters.connected(),
        failed = ?failed,
        "Adapters initialised"
    );

    let state = AppState::new(Arc::clone(&config), adapters.clone(), metrics)?;
    for name in state.router.commands().names() {
        info!(name: "mcp.command.available", command = %name, "Command available");
    }

    let shutdown = CancellationToken::new();
    let sweeper = state
        .sessions
        .spawn_sweeper(config.session.cleanup_interval(), shutdown.clone());

    let app = build_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        warn!(name: "session.sweeper.join_failed", error = %e, "Session sweeper ended abnormally");
    }
    adapters.disconnect_all().await;
    info!(name: "server.stopped", "Server stopped");
    Ok(())
}

/// Build the HTTP router for `state`.
pub fn build_router(state: AppState) -> Router {
    // Disabled timeouts become a very long one so the layer stack keeps one type.
    let timeout_duration = if state.config.server.timeout_disabled {
        Duration::from_secs(365 * 24 * 60 * 60)
    } else {
        Duration::from_secs(state.config.server.request_timeout_secs)
    };

    Router::new()
        .route("/mcp", post(api_mcp))
        .route("/api/commands", get(api_list_commands))
        .route(
            "/api/sessions/{id}",
            get(api_get_session).delete(api_delete_session),
        )
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| async move {
                match tokio::time::timeout(timeout_duration, next.run(req)).await {
                    Ok(res) => res,
                    Err(_) => (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response(),
                }
            },
        ))
        .with_state(state)
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(name: "server.signal.failed", error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
        () = cancel.cancelled() => {},
    }
    info!(name: "server.shutdown", "Shutdown requested");
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// An [`McpError`] rendered as `{"error": {"type", "message"}}`.
#[derive(Debug)]
pub struct ApiError(pub McpError);

impl From<McpError> for ApiError {
    fn from(err: McpError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            McpError::Validation { .. } => StatusCode::BAD_REQUEST,
            McpError::NotFound { .. } => StatusCode::NOT_FOUND,
            McpError::Conflict { .. } => StatusCode::CONFLICT,
            McpError::Connection { .. } => StatusCode::SERVICE_UNAVAILABLE,
            McpError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            McpError::Adapter { .. } => StatusCode::BAD_GATEWAY,
            McpError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": ErrorBody::from(&self.0) });
        (self.status(), Json(body)).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /mcp - Handle one command envelope.
async fn api_mcp(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<crate::mcp::Response>, ApiError> {
    let raw: Value = serde_json::from_slice(&body)
        .map_err(|e| McpError::validation(format!("request body is not valid JSON: {e}")))?;
    let command = parse_command(&raw)?;
    let response = state.router.handle_command(command).await?;
    Ok(Json(response))
}

/// GET /api/commands - Registered commands with their schemas.
async fn api_list_commands(State(state): State<AppState>) -> Json<Vec<CommandInfo>> {
    Json(state.router.commands().list())
}

/// GET /api/sessions/:id - Session snapshot (does not refresh expiry).
async fn api_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    state
        .sessions
        .get_session(&id)
        .map(Json)
        .ok_or_else(|| ApiError(McpError::not_found(format!("Session not found: {id}"))))
}

/// DELETE /api/sessions/:id - Delete a session.
async fn api_delete_session(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if state.sessions.delete(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    sessions: usize,
    adapters: Vec<AdapterStatus>,
}

/// GET /health - Adapter connection states and session count.
///
/// Always 200; `status` is `degraded` while any adapter is disconnected.
async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let adapters = state.adapters.statuses();
    let status = if adapters.iter().all(|a| a.connected) {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthReport {
        status,
        sessions: state.sessions.len(),
        adapters,
    })
}

/// GET /metrics - Prometheus text exposition.
async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed",
        )
            .into_response(),
    }
}
