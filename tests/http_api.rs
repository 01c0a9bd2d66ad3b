use axum::http::StatusCode;
use axum_test::TestServer;
use mcp_gateway::AppState;
use mcp_gateway::adapters::{AdapterHandle, AdapterRegistry, memory::MemoryAdapter};
use mcp_gateway::config::AppConfig;
use mcp_gateway::server::build_router;
use serde_json::{Value, json};
use std::sync::Arc;

async fn test_server() -> (TestServer, AppState) {
    let config = Arc::new(AppConfig::load_from_args(["mcp-gateway"]).expect("default config"));

    let adapters = AdapterRegistry::new();
    adapters
        .register(AdapterHandle::new(Arc::new(MemoryAdapter::in_process())))
        .unwrap();
    adapters.connect_all().await;

    let state = AppState::new(config, adapters, None).expect("state");
    let server = TestServer::new(build_router(state.clone())).expect("test server");
    (server, state)
}

#[tokio::test]
async fn test_ping_round_trip() {
    let (server, state) = test_server().await;

    let response = server
        .post("/mcp")
        .json(&json!({"command": "system.ping", "sessionId": "fresh"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["result"]["pong"], json!(true));
    assert!(body.get("error").is_none());

    let session_id = body["sessionId"].as_str().unwrap();
    assert_ne!(session_id, "fresh");
    assert!(state.sessions.get_session(session_id).is_some());
}

#[tokio::test]
async fn test_invalid_envelope_is_400() {
    let (server, _) = test_server().await;

    let response = server.post("/mcp").json(&json!({"command": "system.ping"})).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["type"], json!("ValidationError"));

    let response = server.post("/mcp").text("not json").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_command_is_404() {
    let (server, _) = test_server().await;

    let response = server
        .post("/mcp")
        .json(&json!({"command": "does.not.exist", "sessionId": "s"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["type"], json!("NotFoundError"));
    assert!(
        body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Command not found")
    );
}

#[tokio::test]
async fn test_handler_errors_stay_in_envelope() {
    let (server, _) = test_server().await;

    let response = server
        .post("/mcp")
        .json(&json!({
            "command": "memory.get",
            "sessionId": "s",
            "parameters": {"key": "missing"}
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["error"]["type"], json!("NotFoundError"));
    assert!(body.get("result").is_none());
}

#[tokio::test]
async fn test_session_state_persists_across_commands() {
    let (server, _) = test_server().await;

    let first: Value = server
        .post("/mcp")
        .json(&json!({
            "command": "session.set",
            "sessionId": "new",
            "parameters": {"values": {"topic": "rust"}}
        }))
        .await
        .json();
    let session_id = first["sessionId"].as_str().unwrap().to_string();

    let second: Value = server
        .post("/mcp")
        .json(&json!({"command": "session.get", "sessionId": session_id}))
        .await
        .json();
    assert_eq!(second["sessionId"], json!(session_id));
    assert_eq!(second["result"]["state"]["topic"], json!("rust"));

    let snapshot = server.get(&format!("/api/sessions/{session_id}")).await;
    assert_eq!(snapshot.status_code(), StatusCode::OK);
    assert_eq!(snapshot.json::<Value>()["state"]["topic"], json!("rust"));

    let deleted = server.delete(&format!("/api/sessions/{session_id}")).await;
    assert_eq!(deleted.status_code(), StatusCode::NO_CONTENT);

    let gone = server.get(&format!("/api/sessions/{session_id}")).await;
    assert_eq!(gone.status_code(), StatusCode::NOT_FOUND);
    let again = server.delete(&format!("/api/sessions/{session_id}")).await;
    assert_eq!(again.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_commands() {
    let (server, _) = test_server().await;

    let commands: Value = server.get("/api/commands").await.json();
    let names: Vec<&str> = commands
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();

    for expected in ["system.ping", "system.info", "session.get", "session.set", "memory.get"] {
        assert!(names.contains(&expected), "{expected} missing from {names:?}");
    }
    // No search endpoint configured in this server.
    assert!(!names.contains(&"search"));
}

#[tokio::test]
async fn test_health_reports_adapters() {
    let (server, state) = test_server().await;

    let health: Value = server.get("/health").await.json();
    assert_eq!(health["status"], json!("ok"));
    assert_eq!(health["adapters"][0]["name"], json!("memory"));
    assert_eq!(health["adapters"][0]["state"], json!("connected"));

    state.adapters.disconnect_all().await;
    let health: Value = server.get("/health").await.json();
    assert_eq!(health["status"], json!("degraded"));
}

#[tokio::test]
async fn test_metrics_without_recorder() {
    let (server, _) = test_server().await;
    let response = server.get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
}
