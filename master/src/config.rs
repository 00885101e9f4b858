//! Configuration for the master service.
//!
//! Everything is settable as a CLI flag (with env-var fallbacks), and the
//! whole set is also accepted as one `--engine-args "k=v,k=v"` string, the
//! form game controllers pass engine options in. Engine-args win over flags.

use anyhow::{anyhow, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing::warn;

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "master")]
#[command(about = "GTP master coordinating a fleet of UCT slave engines")]
#[command(
    long_about = "Speaks GTP on stdin/stdout and multiplexes a fleet of slave
engines connected over TCP. Slaves run the plain UCT engine and connect to
slave_port; their candidate-move statistics are merged and the most played
move wins."
)]
pub struct Config {
    /// TCP port slaves connect to
    #[arg(long, env = "MASTER_SLAVE_PORT")]
    pub slave_port: Option<u16>,

    /// TCP port for the optional slave log proxy
    #[arg(long, env = "MASTER_PROXY_PORT")]
    pub proxy_port: Option<u16>,

    /// Maximum number of concurrent slaves
    #[arg(long, env = "MASTER_MAX_SLAVES", default_value_t = 100)]
    pub max_slaves: usize,

    /// Forward the quit command to slaves
    #[arg(long, env = "MASTER_SLAVES_QUIT", default_value_t = false)]
    pub slaves_quit: bool,

    /// TCP port for the health/metrics HTTP server
    #[arg(long, env = "MASTER_STATUS_PORT")]
    pub status_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MASTER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Engine options as comma-separated key=value pairs,
    /// e.g. "slave_port=1234,proxy_port=1235,max_slaves=50"
    #[arg(long)]
    pub engine_args: Option<String>,
}

impl Config {
    /// Parse the CLI. `--engine-args` is applied separately by the caller,
    /// after logging is up, so its warnings are visible.
    pub fn load() -> Self {
        Self::parse()
    }

    /// Apply one `k=v,k=v` option string. Unknown keys warn and are ignored;
    /// a value that fails to parse keeps the previous setting.
    pub fn apply_engine_args(&mut self, args: &str) {
        for pair in args.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (key, value) = match pair.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (pair, None),
            };
            match key.to_ascii_lowercase().as_str() {
                "slave_port" => match value.and_then(|v| v.parse().ok()) {
                    Some(port) => self.slave_port = Some(port),
                    None => warn!(key, "engine argument needs a port value"),
                },
                "proxy_port" => match value.and_then(|v| v.parse().ok()) {
                    Some(port) => self.proxy_port = Some(port),
                    None => warn!(key, "engine argument needs a port value"),
                },
                "max_slaves" => match value.and_then(|v| v.parse().ok()) {
                    Some(n) => self.max_slaves = n,
                    None => warn!(key, "engine argument needs a count value"),
                },
                // Present without a value means enabled, matching the usual
                // engine-option convention.
                "slaves_quit" => {
                    self.slaves_quit = value.map_or(true, |v| v.parse().unwrap_or(v != "0"));
                }
                "status_port" => match value.and_then(|v| v.parse().ok()) {
                    Some(port) => self.status_port = Some(port),
                    None => warn!(key, "engine argument needs a port value"),
                },
                _ => warn!(key, "unknown engine argument"),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.slave_port.is_none() {
            return Err(anyhow!("missing slave_port"));
        }

        if self.max_slaves == 0 {
            return Err(anyhow!("max_slaves must be greater than 0"));
        }

        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!(
                "invalid log level '{}', expected one of trace, debug, info, warn, error",
                self.log_level
            ));
        }

        Ok(())
    }
}
