//! Occupancy Service - Sensor ingestion and HTTP API.
//!
//! Run with: `cargo run -p occupancy-service`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use occupancy_service::{AppState, Collector, Config, SensorMode, api};
use occupancy_store::Store;

/// Occupancy Service - Sensor ingestion and HTTP REST API.
#[derive(Parser, Debug)]
#[command(name = "occupancy-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "OCCUPANCY_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// Database path (overrides config).
    #[arg(short, long, env = "OCCUPANCY_DB")]
    database: Option<PathBuf>,

    /// Disable the poll collector (API and webhook only).
    #[arg(long)]
    no_collector: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("occupancy_service=info".parse()?)
                .add_directive("occupancy_store=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    // Load configuration
    let mut config = Config::load_or_default(args.config.as_deref())?;

    // Override config with CLI args
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(db_path) = args.database {
        config.storage.path = db_path;
    }
    config.validate()?;

    // Open the writer, then a read-only connection for statistics
    let store = Store::open(&config.storage.path)
        .with_context(|| format!("Failed to open database {}", config.storage.path.display()))?;
    let state = match Store::open_read_only(&config.storage.path) {
        Ok(reader) => AppState::with_reader(store, reader, config.clone())?,
        Err(e) => {
            warn!("Stats will share the writer connection: {}", e);
            AppState::new(store, config.clone())?
        }
    };

    let live = state.snapshot();
    info!(
        "Live state: in={} out={} occupancy={} (reset date {:?}, zone {})",
        live.count_in, live.count_out, live.occupancy, live.last_reset_date, state.clock
    );

    // Start the poll collector
    let collector_task = if args.no_collector {
        info!("Poll collector disabled");
        None
    } else {
        Collector::new(Arc::clone(&state)).start()
    };
    if config.sensor.mode == SensorMode::Push {
        info!("Waiting for sensor pushes on POST /api/webhook");
    }

    // Build the router
    let app = Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(Arc::clone(&state));

    // Parse bind address
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind))?;

    info!("Starting server on {}", addr);

    // Run the server until Ctrl-C
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.collector.signal_stop();
    if let Some(task) = collector_task {
        let _ = task.await;
    }
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
