//! Aegis Historian Server Binary
//!
//! REST server for the Aegis historian surrogate.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use aegis_server::{create_router, AppState, ServerConfig};
use chrono::Utc;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;

#[derive(Parser)]
#[command(name = "aegis-historian-server")]
#[command(about = "Aegis Historian Surrogate API Server")]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for reproducible simulation runs
    #[arg(long)]
    seed: Option<u64>,

    /// Store capacity before the oldest samples are evicted
    #[arg(long)]
    max_data_points: Option<usize>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match args.config.as_ref() {
        Some(path) => match ServerConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    let config = config
        .with_seed(args.seed)
        .with_max_data_points(args.max_data_points);
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let addr: SocketAddr = config.socket_addr();
    let sweep_interval = config.historian.retention_sweep_interval_secs.max(1);

    tracing::info!("Starting Aegis Historian Server on {}", addr);
    tracing::info!(
        "Store capacity: {} points, retention sweep every {}s",
        config.historian.max_data_points,
        sweep_interval
    );
    if config.auth.is_some() {
        tracing::info!("Basic authentication enabled");
    }
    if let Some(seed) = config.simulation.seed {
        tracing::info!("Simulation seed: {}", seed);
    }

    let state = AppState::new(config);
    let app = create_router(state.clone());

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Aegis Historian Server listening on http://{}", addr);

    // Periodic retention sweep
    let state_for_retention = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(sweep_interval));
        loop {
            interval.tick().await;
            let result = state_for_retention.engine.apply_retention(Utc::now());
            if result.points_deleted > 0 {
                tracing::info!(
                    "Retention sweep removed {} points across {} tags in {}ms",
                    result.points_deleted,
                    result.tags_swept,
                    result.duration_ms
                );
            }
        }
    });

    // Run server with graceful shutdown
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
    {
        tracing::error!("Server error: {}", e);
    }
}

async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    let stats = state.engine.stats();
    tracing::info!(
        "Shutdown signal received after {} requests, {} points in store",
        state.requests_served(),
        stats.store.total_points
    );
}
