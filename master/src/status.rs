//! Prometheus metrics and the optional status HTTP server.
//!
//! The coordination core never depends on this; metrics are plain process
//! globals updated from the hot paths, and the HTTP server only runs when a
//! `status_port` is configured.

use std::sync::Arc;
use std::sync::Once;

use axum::{routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::coordination::Coordination;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    /// Slaves currently inside their service loop.
    pub static ref CONNECTED_SLAVES: IntGauge = IntGauge::with_opts(
        Opts::new("master_connected_slaves", "Slaves currently serving this master")
    ).unwrap();

    /// Replies accepted into the reply buffer.
    pub static ref REPLIES_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("master_replies_total", "Slave replies accepted for the current command")
    ).unwrap();

    /// History replays triggered by desynchronized slaves.
    pub static ref RESYNCS_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("master_resyncs_total", "Full-history replays sent to out-of-sync slaves")
    ).unwrap();

    /// Wall-clock time spent selecting a move.
    pub static ref GENMOVE_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("master_genmove_seconds", "Time from genmove to move selection")
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    ).unwrap();

    /// Aggregate playouts behind the most recent move selection.
    pub static ref LAST_MOVE_PLAYOUTS: IntGauge = IntGauge::with_opts(
        Opts::new("master_last_move_playouts", "Aggregate playouts behind the last selected move")
    ).unwrap();
}

static INIT: Once = Once::new();

/// Register all metrics. Safe to call more than once.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY.register(Box::new(CONNECTED_SLAVES.clone())).unwrap();
        REGISTRY.register(Box::new(REPLIES_TOTAL.clone())).unwrap();
        REGISTRY.register(Box::new(RESYNCS_TOTAL.clone())).unwrap();
        REGISTRY.register(Box::new(GENMOVE_SECONDS.clone())).unwrap();
        REGISTRY.register(Box::new(LAST_MOVE_PLAYOUTS.clone())).unwrap();
    });
}

/// Encode all metrics to the Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Serve `/health`, `/ready` and `/metrics` on the given port.
///
/// Liveness is unconditional (the process answering is the signal); readiness
/// additionally requires at least one connected slave.
pub async fn start_status_server(
    port: u16,
    coord: Arc<Coordination>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = Router::new()
        .route("/health", get(|| async { axum::http::StatusCode::OK }))
        .route(
            "/ready",
            get({
                let coord = Arc::clone(&coord);
                move || ready_handler(coord.clone())
            }),
        )
        .route("/metrics", get(|| async { encode_metrics() }));

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Status server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn ready_handler(coord: Arc<Coordination>) -> axum::http::StatusCode {
    let ready = coord
        .lock()
        .map(|state| state.active_slaves > 0)
        .unwrap_or(false);
    if ready {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_init_is_idempotent() {
        init_metrics();
        init_metrics();
    }

    #[test]
    fn encode_includes_master_metrics() {
        init_metrics();
        let output = encode_metrics();
        assert!(output.contains("master_connected_slaves"));
        assert!(output.contains("master_resyncs_total"));
    }
}
