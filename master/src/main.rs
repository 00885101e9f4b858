//! Master - GTP front for a fleet of distributed UCT slave engines
//!
//! A long-running process that:
//! 1. Accepts slave engine connections on `slave_port`
//! 2. Mirrors the upstream GTP stream to every slave, replaying history to
//!    late or desynchronized ones
//! 3. Merges per-slave move statistics and plays the most popular move
//! 4. Optionally merges slave logs (`proxy_port`) and serves health/metrics
//!    endpoints (`status_port`)

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::time::Instant;
use tracing::{error, info};

mod aggregate;
mod command_log;
mod config;
mod coordination;
mod driver;
mod engine;
mod proxy;
mod slave;
mod status;

use crate::config::Config;
use crate::coordination::Coordination;
use crate::engine::Master;

fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        // GTP owns stdout; all of our own output goes to stderr.
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = Config::load();
    init_tracing(&config.log_level);
    if let Some(args) = config.engine_args.clone() {
        config.apply_engine_args(&args);
    }
    config.validate()?;

    let started = Instant::now();
    status::init_metrics();

    let slave_port = config.slave_port.context("missing slave_port")?;
    let coord = Arc::new(Coordination::new(config.max_slaves));

    let listener = TcpListener::bind(("0.0.0.0", slave_port))
        .await
        .with_context(|| format!("cannot bind slave port {slave_port}"))?;
    info!(
        port = slave_port,
        max_slaves = config.max_slaves,
        slaves_quit = config.slaves_quit,
        "Master accepting slaves"
    );
    slave::spawn_slots(Arc::clone(&coord), listener, config.max_slaves);

    if let Some(port) = config.proxy_port {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("cannot bind proxy port {port}"))?;
        info!(port, "Log proxy accepting slaves");
        tokio::spawn(proxy::run_proxy(listener, started));
    }

    if let Some(port) = config.status_port {
        let coord = Arc::clone(&coord);
        tokio::spawn(async move {
            if let Err(e) = status::start_status_server(port, coord).await {
                error!(port, error = %e, "Status server error");
            }
        });
    }

    let mut master = Master::new(coord, config.slaves_quit);

    tokio::select! {
        result = driver::run(&mut master) => {
            result?;
            info!("Controller closed the session");
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    Ok(())
}
