//! Logging and metrics setup.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,mcp_gateway=debug";

/// Install the global tracing subscriber.
///
/// Log levels come from `RUST_LOG`, defaulting to `info,mcp_gateway=debug`.
/// Setting `LOG_FORMAT=json` switches to JSON lines.
pub fn init() {
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter_layer);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .compact(),
            )
            .init();
    }
}

/// Install the global Prometheus recorder and return the handle used to
/// render `/metrics`.
pub fn install_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(handle)
}

fn describe_metrics() {
    metrics::describe_counter!("mcp_commands_total", "Commands handled, by command and outcome");
    metrics::describe_histogram!(
        "mcp_command_duration_seconds",
        metrics::Unit::Seconds,
        "Time spent handling a command"
    );
    metrics::describe_counter!("adapter_calls_total", "Adapter calls, by adapter and outcome");
    metrics::describe_counter!("adapter_retries_total", "Adapter call retries, by adapter");
    metrics::describe_histogram!(
        "adapter_call_duration_seconds",
        metrics::Unit::Seconds,
        "Adapter call latency including retries"
    );
    metrics::describe_counter!("sessions_expired_total", "Sessions removed by the expiry sweep");
}
