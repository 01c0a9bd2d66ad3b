//! HTTP adapters against throwaway backends bound to 127.0.0.1:0.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use mcp_gateway::adapters::{
    Adapter, AdapterConfig, AdapterHandle, CallOptions, ConnectionState, RetryPolicy,
    browser::BrowserAdapter, fetch::FetchAdapter, memory::MemoryAdapter, search::SearchAdapter,
    vector::VectorAdapter,
};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn handle(adapter: Arc<dyn Adapter>, max_retries: u32) -> AdapterHandle {
    let name = adapter.name().to_string();
    AdapterHandle::with_config(
        adapter,
        AdapterConfig::new(name, Duration::from_secs(5), max_retries),
        RetryPolicy::default().with_delays(10, 50),
    )
}

// ─── search ─────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct SearchBackend {
    calls: Arc<AtomicU32>,
    failures: u32,
}

async fn search_root() -> &'static str {
    "searx"
}

async fn search_results(
    State(backend): State<SearchBackend>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let n = backend.calls.fetch_add(1, Ordering::SeqCst);
    if n < backend.failures {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({}))).into_response();
    }
    assert_eq!(params.get("format").map(String::as_str), Some("json"));
    let q = params.get("q").cloned().unwrap_or_default();
    Json(json!({
        "results": [
            {"title": format!("{q} one"), "url": "https://a.example", "content": "first"},
            {"title": format!("{q} two"), "url": "https://b.example", "content": "second"},
            {"title": format!("{q} three"), "url": "https://c.example", "content": "third"}
        ]
    }))
    .into_response()
}

async fn search_server(failures: u32) -> (String, Arc<AtomicU32>) {
    let backend = SearchBackend {
        calls: Arc::new(AtomicU32::new(0)),
        failures,
    };
    let calls = Arc::clone(&backend.calls);
    let app = Router::new()
        .route("/", get(search_root))
        .route("/search", get(search_results))
        .with_state(backend);
    (spawn(app).await, calls)
}

#[tokio::test]
async fn test_search_trims_to_limit() {
    let (base, _) = search_server(0).await;
    let search = handle(Arc::new(SearchAdapter::new(&base).unwrap()), 0);
    search.connect().await.unwrap();

    let value = search
        .execute(
            "search",
            json!({"query": "tokio", "limit": 2}),
            CallOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(value["total"], json!(2));
    assert_eq!(value["results"][0]["title"], json!("tokio one"));
    assert_eq!(value["results"][1]["url"], json!("https://b.example"));
}

#[tokio::test]
async fn test_search_retries_server_errors() {
    let (base, calls) = search_server(2).await;
    let search = handle(Arc::new(SearchAdapter::new(&base).unwrap()), 2);
    search.connect().await.unwrap();

    let value = search
        .execute("search", json!({"query": "x"}), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(value["total"], json!(3));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_search_gives_up_after_retries() {
    let (base, calls) = search_server(100).await;
    let search = handle(Arc::new(SearchAdapter::new(&base).unwrap()), 1);
    search.connect().await.unwrap();

    let err = search
        .execute("search", json!({"query": "x"}), CallOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind_name(), "ConnectionError");
    assert!(err.to_string().contains("2 attempt"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unreachable_backend_fails_connect() {
    // Bind and drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let search = handle(
        Arc::new(SearchAdapter::new(&format!("http://{addr}")).unwrap()),
        0,
    );
    let err = search.connect().await.unwrap_err();
    assert_eq!(err.kind_name(), "ConnectionError");
    assert_eq!(search.state(), ConnectionState::Failed);

    let err = search
        .execute("search", json!({"query": "x"}), CallOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind_name(), "ConnectionError");
}

// ─── memory (REST store) ────────────────────────────────────────────────────

type Kv = Arc<Mutex<HashMap<String, Value>>>;

async fn kv_get(State(kv): State<Kv>, Path(key): Path<String>) -> impl IntoResponse {
    match kv.lock().unwrap().get(&key) {
        Some(value) => Json(json!({ "value": value })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn kv_put(
    State(kv): State<Kv>,
    Path(key): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    kv.lock().unwrap().insert(key, body["value"].clone());
    StatusCode::NO_CONTENT
}

async fn kv_delete(State(kv): State<Kv>, Path(key): Path<String>) -> StatusCode {
    if kv.lock().unwrap().remove(&key).is_some() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn kv_list(
    State(kv): State<Kv>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let prefix = params.get("prefix").cloned().unwrap_or_default();
    let keys: Vec<String> = kv
        .lock()
        .unwrap()
        .keys()
        .filter(|k| k.starts_with(&prefix))
        .cloned()
        .collect();
    Json(json!({ "keys": keys }))
}

#[tokio::test]
async fn test_memory_rest_store() {
    let kv: Kv = Arc::new(Mutex::new(HashMap::new()));
    let app = Router::new()
        .route("/keys", get(kv_list))
        .route("/keys/{key}", get(kv_get).put(kv_put).delete(kv_delete))
        .with_state(Arc::clone(&kv));
    let base = spawn(app).await;

    let memory = handle(Arc::new(MemoryAdapter::remote(&base).unwrap()), 0);
    // The probe key is absent, so the 404 counts as healthy.
    memory.connect().await.unwrap();
    assert!(memory.is_connected());

    memory
        .execute("set", json!({"key": "notes/a b", "value": [1, 2]}), CallOptions::default())
        .await
        .unwrap();
    memory
        .execute("set", json!({"key": "other", "value": true}), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(kv.lock().unwrap()["notes/a b"], json!([1, 2]));

    let got = memory
        .execute("get", json!({"key": "notes/a b"}), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(got["value"], json!([1, 2]));

    let listed = memory
        .execute("list", json!({"prefix": "notes/"}), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(listed["keys"], json!(["notes/a b"]));

    let deleted = memory
        .execute("delete", json!({"key": "other"}), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(deleted["deleted"], json!(true));

    let missing = memory
        .execute("get", json!({"key": "other"}), CallOptions::default())
        .await
        .unwrap_err();
    assert_eq!(missing.kind_name(), "NotFoundError");
}

#[tokio::test]
async fn test_memory_probe_rejects_unauthorized_store() {
    let app = Router::new().route(
        "/keys/{key}",
        get(|| async { (StatusCode::UNAUTHORIZED, "no token") }),
    );
    let base = spawn(app).await;

    let memory = handle(Arc::new(MemoryAdapter::remote(&base).unwrap()), 0);
    let err = memory.connect().await.unwrap_err();
    assert_eq!(err.kind_name(), "ConnectionError");
    assert_eq!(memory.state(), ConnectionState::Failed);
}

// ─── vector ─────────────────────────────────────────────────────────────────

type Captured = Arc<Mutex<Vec<Value>>>;

async fn vector_upsert(
    State(captured): State<Captured>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    assert_eq!(collection, "docs");
    captured.lock().unwrap().push(body);
    Json(json!({"result": {"status": "acknowledged"}, "status": "ok"}))
}

async fn vector_search(Path(collection): Path<String>, Json(body): Json<Value>) -> impl IntoResponse {
    if collection == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({"status": {"error": "Not found"}}))).into_response();
    }
    if body["vector"].as_array().map(Vec::len) != Some(2) {
        return (StatusCode::BAD_REQUEST, "wrong dimension").into_response();
    }
    Json(json!({
        "result": [
            {"id": 1, "score": 0.9, "payload": {"doc": "a"}},
            {"id": "b", "score": 0.5}
        ]
    }))
    .into_response()
}

#[tokio::test]
async fn test_vector_operations() {
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/collections", get(|| async { Json(json!({"result": {"collections": []}})) }))
        .route("/collections/{c}/points", put(vector_upsert))
        .route("/collections/{c}/points/search", post(vector_search))
        .route(
            "/collections/{c}/points/delete",
            post(|| async { Json(json!({"result": {"status": "acknowledged"}})) }),
        )
        .with_state(Arc::clone(&captured));
    let base = spawn(app).await;

    let vector = handle(Arc::new(VectorAdapter::new(&base).unwrap()), 0);
    vector.connect().await.unwrap();

    let upserted = vector
        .execute(
            "upsert",
            json!({"collection": "docs", "points": [{"id": 1, "vector": [0.5, 0.25]}]}),
            CallOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(upserted["upserted"], json!(1));
    assert_eq!(upserted["status"], json!("acknowledged"));
    assert_eq!(captured.lock().unwrap()[0]["points"][0]["vector"], json!([0.5, 0.25]));

    let matches = vector
        .execute(
            "query",
            json!({"collection": "docs", "vector": [0.1, 0.2]}),
            CallOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(matches["matches"][0]["payload"], json!({"doc": "a"}));
    assert_eq!(matches["matches"][1]["id"], json!("b"));

    let rejected = vector
        .execute(
            "query",
            json!({"collection": "docs", "vector": [0.1]}),
            CallOptions::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(rejected.kind_name(), "AdapterError");
    assert!(rejected.to_string().contains("wrong dimension"));

    let missing = vector
        .execute(
            "query",
            json!({"collection": "missing", "vector": [0.1, 0.2]}),
            CallOptions::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(missing.kind_name(), "NotFoundError");

    let deleted = vector
        .execute(
            "delete",
            json!({"collection": "docs", "ids": [1, "b"]}),
            CallOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(deleted["deleted"], json!(2));
}

// ─── browser ────────────────────────────────────────────────────────────────

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[tokio::test]
async fn test_browser_content_and_screenshot() {
    let app = Router::new()
        .route("/json/version", get(|| async { Json(json!({"Browser": "HeadlessChrome"})) }))
        .route(
            "/content",
            post(|Json(body): Json<Value>| async move {
                format!("<html><body>{}</body></html>", body["url"].as_str().unwrap_or_default())
            }),
        )
        .route(
            "/screenshot",
            post(|| async { Bytes::from_static(&PNG_MAGIC) }),
        );
    let base = spawn(app).await;

    let browser = handle(Arc::new(BrowserAdapter::new(&base).unwrap()), 0);
    browser.connect().await.unwrap();

    let page = browser
        .execute("content", json!({"url": "https://example.com"}), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(
        page["html"],
        json!("<html><body>https://example.com</body></html>")
    );

    let shot = browser
        .execute("screenshot", json!({"url": "https://example.com"}), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(shot["mimeType"], json!("image/png"));
    assert_eq!(shot["bytes"], json!(8));
    assert_eq!(shot["data"], json!("iVBORw0KGgo="));
}

// ─── fetch ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_caps_body_and_classifies_status() {
    let app = Router::new()
        .route("/page", get(|| async { "0123456789abcdefghij" }))
        .route("/slow", get(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            "late"
        }))
        .route("/gone", get(|| async { StatusCode::NOT_FOUND }))
        .route("/teapot", get(|| async { StatusCode::IM_A_TEAPOT }));
    let base = spawn(app).await;

    let fetch = handle(Arc::new(FetchAdapter::new(10).unwrap()), 0);
    fetch.connect().await.unwrap();

    let page = fetch
        .execute("fetch", json!({"url": format!("{base}/page")}), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(page["status"], json!(200));
    assert_eq!(page["body"], json!("0123456789"));
    assert_eq!(page["truncated"], json!(true));
    assert!(page["contentType"].as_str().unwrap().starts_with("text/plain"));

    let gone = fetch
        .execute("fetch", json!({"url": format!("{base}/gone")}), CallOptions::default())
        .await
        .unwrap_err();
    assert_eq!(gone.kind_name(), "NotFoundError");

    let teapot = fetch
        .execute("fetch", json!({"url": format!("{base}/teapot")}), CallOptions::default())
        .await
        .unwrap_err();
    assert_eq!(teapot.kind_name(), "AdapterError");

    let slow = fetch
        .execute(
            "fetch",
            json!({"url": format!("{base}/slow")}),
            CallOptions::with_timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();
    assert_eq!(slow.kind_name(), "TimeoutError");
    assert!(slow.to_string().contains("fetch"));
}

#[tokio::test]
async fn test_fetch_small_body_is_not_truncated() {
    let app = Router::new().route("/", get(|| async { Json(Map::new()) }));
    let base = spawn(app).await;

    let fetch = handle(Arc::new(FetchAdapter::new(1024).unwrap()), 0);
    fetch.connect().await.unwrap();

    let page = fetch
        .execute("fetch", json!({"url": format!("{base}/")}), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(page["body"], json!("{}"));
    assert_eq!(page["truncated"], json!(false));
}
