mod dto;
mod errors;
mod fetch;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use scour_config::CrawlerConfig;
use scour_store::DbPool;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "crawler-service")]
#[command(about = "URL lifecycle, scheduler and crawl worker HTTP API")]
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

    let mut config = CrawlerConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    config.validate()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.bind_address,
        worker_concurrency = config.worker_concurrency,
        "starting crawler-service"
    );

    let pool = DbPool::connect(&config.database).await?;
    pool.init_schema().await?;

    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState::new(pool, config)?);

    let app = Router::new()
        .route("/urls", post(handlers::add_urls))
        .route("/status", get(handlers::status))
        .route("/queue", get(handlers::queue))
        .route("/history", get(handlers::history))
        .route(
            "/seeds",
            post(handlers::add_seed).delete(handlers::remove_seed).get(handlers::list_seeds),
        )
        .route("/seeds/requeue", post(handlers::requeue_seeds))
        .route("/seeds/import-tranco", post(handlers::import_tranco))
        .route("/worker/start", post(handlers::worker_start))
        .route("/worker/stop", post(handlers::worker_stop))
        .route("/worker/status", get(handlers::worker_status))
        .route("/score/predict", post(handlers::score_predict))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state);

    let addr: SocketAddr = bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "crawler-service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("crawler-service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to listen for Ctrl+C");
    tracing::info!("received shutdown signal");
}
