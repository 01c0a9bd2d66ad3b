//! MCP Gateway server
//!
//! Entry point: loads configuration, starts the HTTP transport.

use std::sync::Arc;

use mimalloc::MiMalloc;

use mcp_gateway::config::AppConfig;
use mcp_gateway::{server, telemetry};

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present) before anything reads the environment
    let _ = dotenvy::dotenv();

    telemetry::init();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        name: "config.loaded",
        address = %config.bind_addr(),
        session_ttl_secs = config.session.ttl_secs,
        "Configuration loaded"
    );

    server::start_server(Arc::new(config)).await
}
