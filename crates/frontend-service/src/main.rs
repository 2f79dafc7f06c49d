mod dto;
mod errors;
mod handlers;
mod predict;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use scour_config::FrontendConfig;
use scour_store::DbPool;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "frontend-service")]
#[command(about = "Query engine and search-quality HTTP API")]
struct Args {
    /// Overrides `BIND_ADDRESS` when set.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let args = Args::parse();

    let mut config = FrontendConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    config.validate()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.bind_address,
        "starting frontend-service"
    );

    let pool = DbPool::connect(&config.database).await?;
    pool.init_schema().await?;

    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState::new(pool, config));

    let app = Router::new()
        .route("/api/search", get(handlers::search))
        .route("/api/search/click", post(handlers::click))
        .route("/api/quality/summary", get(handlers::quality_summary))
        .route("/api/predict", get(handlers::predict))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state);

    let addr: SocketAddr = bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "frontend-service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("frontend-service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to listen for Ctrl+C");
    tracing::info!("received shutdown signal");
}
