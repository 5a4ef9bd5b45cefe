// crates/server/src/main.rs
//! Docflow server binary.
//!
//! Builds the status store (Redis-backed when REDIS_URL is reachable,
//! in-memory otherwise), starts the Axum HTTP server, and runs the retention
//! sweeper until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use docflow_core::{sweeper, JobRegistry, StatusStore, TrackerConfig};
use docflow_server::{create_app, AppState};

#[derive(Debug, Parser)]
#[command(name = "docflow", version, about = "Document job tracker server")]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "DOCFLOW_PORT", default_value_t = 3001)]
    port: u16,

    /// Redis connection URL. When unset (or unreachable at startup) the
    /// server runs with in-process status storage.
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Compression factor applied to planned stage durations.
    #[arg(long, default_value_t = 60.0)]
    speed_multiplier: f64,

    /// Nominal progress tick interval in milliseconds.
    #[arg(long, default_value_t = 2000)]
    tick_ms: u64,

    /// SSE poll cadence in seconds.
    #[arg(long, default_value_t = 1)]
    poll_secs: u64,

    /// Retention window for finished job records, in hours.
    #[arg(long, default_value_t = 2)]
    retention_hours: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let args = Args::parse();
    let config = TrackerConfig {
        retention_hours: args.retention_hours,
        tick_ms: args.tick_ms,
        poll_secs: args.poll_secs,
        speed_multiplier: args.speed_multiplier,
    };

    let store = match &args.redis_url {
        Some(url) => Arc::new(StatusStore::connect(url, config.ttl_secs()).await),
        None => {
            tracing::info!("no REDIS_URL configured, using in-memory status store");
            Arc::new(StatusStore::in_memory())
        }
    };
    tracing::info!(mode = store.mode().as_str(), "status store ready");

    let shutdown = CancellationToken::new();
    let sweeper_handle = tokio::spawn(sweeper::run_sweeper(
        Arc::clone(&store),
        config.retention(),
        shutdown.clone(),
    ));

    let state = Arc::new(AppState::new(JobRegistry::new(store, config)));
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "docflow listening");

    let shutdown_signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            shutdown_signal.cancel();
        })
        .await?;

    let _ = sweeper_handle.await;
    Ok(())
}
