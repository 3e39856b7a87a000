//! Inflight admission gate daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!     Gateway request ──▶ InflightGate ──▶ QosPolicy ──▶ GET  <ns>:inflight:<provider>
//!                              │
//!                              ▼
//!                        AdmissionGuard ──▶ InflightCounter ──▶ RetryPolicy ──▶ Redis
//!                              │               INCR / DECR / EXPIRE
//!                              ▼
//!                      upstream (immediate or streamed)
//!
//!     Operator ──▶ inflight-cli ──▶ admin API ──▶ list / show / reset counters
//! ```
//!
//! This binary runs the operator surface: the admin API, the metrics
//! endpoint, and config hot reload. Gateways embed the library.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use inflight_gate::config::loader::{apply_env_overrides, load_config};
use inflight_gate::config::validation::validate_config;
use inflight_gate::config::watcher::ConfigWatcher;
use inflight_gate::config::GateConfig;
use inflight_gate::lifecycle::{signals, startup, Shutdown};
use inflight_gate::observability::{logging, metrics};
use inflight_gate::admin::{self, AdminState};

#[derive(Parser)]
#[command(name = "inflight-gate")]
#[command(about = "Inflight admission counter service", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "INFLIGHT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            let mut config = GateConfig::default();
            apply_env_overrides(&mut config, |name| std::env::var(name).ok());
            validate_config(&config).map_err(inflight_gate::config::loader::ConfigError::Validation)?;
            config
        }
    };

    logging::init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "inflight-gate starting");
    tracing::info!(
        namespace = %config.counter.namespace,
        ttl_secs = config.counter.ttl_secs,
        max_retries = config.retries.max_retries,
        default_threshold = config.qos.default_threshold,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let gate = startup::connect_gate(&config).await?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(&shutdown);

    // Keep the watcher alive for the life of the process
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            tokio::spawn(startup::apply_reloads(gate.clone(), updates, shutdown.subscribe()));
            Some(watcher)
        }
        None => None,
    };

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState::new(gate, &config.admin.api_key);
        admin::serve(listener, state, shutdown.subscribe()).await?;
    } else {
        tracing::warn!("Admin API disabled, waiting for shutdown");
        let _ = shutdown.subscribe().recv().await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
