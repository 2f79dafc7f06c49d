mod auth;
mod dto;
mod errors;
mod handlers;
mod rank_job;
mod state;
mod worker;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use scour_config::IndexerConfig;
use scour_store::DbPool;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::worker::IndexWorkerConfig;

#[derive(Parser)]
#[command(name = "indexer-service")]
#[command(about = "Index job queue worker and indexer HTTP API")]
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

    let mut config = IndexerConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    config.validate()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.bind_address,
        "starting indexer-service"
    );

    let pool = DbPool::connect(&config.database).await?;
    pool.init_schema().await?;

    let bind_address = config.bind_address.clone();
    let worker_config = IndexWorkerConfig {
        batch_size: config.worker_batch_size,
        lease_secs: config.job_lease_secs,
        poll_interval: Duration::from_secs(1),
    };
    let state = Arc::new(AppState::new(pool, config));

    let (worker_handle, shutdown_tx) = worker::spawn(state.index.clone(), state.queue.clone(), worker_config);
    let (rank_job_handle, rank_runner) = rank_job::spawn(
        state.links.clone(),
        state.ranks.clone(),
        Duration::from_secs(state.config.pagerank_interval_secs),
    );

    let app = Router::new()
        .route("/indexer/page", post(handlers::submit_page))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key))
        .route("/indexer/jobs/:job_id", get(handlers::job_status))
        .route("/indexer/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state);

    let addr: SocketAddr = bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "indexer-service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    rank_runner.stop();
    let _ = worker_handle.await;
    let _ = rank_job_handle.await;

    tracing::info!("indexer-service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to listen for Ctrl+C");
    tracing::info!("received shutdown signal");
}
