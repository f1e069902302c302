mod aggregator;
mod ai;
mod auth;
mod config;
mod cvproc;
mod db;
mod errors;
mod limiter;
mod matching;
mod models;
mod repository;
mod response;
mod routes;
mod scrapers;
mod state;
mod storage;
#[cfg(test)]
mod testutil;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::aggregator::AggregationService;
use crate::ai::gemini::GeminiClient;
use crate::ai::CvAnalyzer;
use crate::config::Config;
use crate::cvproc::extract::PdfTextExtractor;
use crate::cvproc::queue::select_queue;
use crate::cvproc::worker::CvWorker;
use crate::db::create_pool;
use crate::matching::MatchingService;
use crate::repository::{PgCvRepository, PgJobRepository, PgUserDirectory};
use crate::routes::build_router;
use crate::scrapers::board::{known_boards, BoardScraper};
use crate::scrapers::remote_feed::RemoteFeedScraper;
use crate::state::AppState;
use crate::storage::{ObjectStore, S3ObjectStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting JobHive API v{}", env!("CARGO_PKG_VERSION"));

    let pool = create_pool(&config.database_url).await?;

    let jobs = Arc::new(PgJobRepository::new(pool.clone()));
    let cvs = Arc::new(PgCvRepository::new(pool.clone()));
    let users = Arc::new(PgUserDirectory::new(pool));

    // Scraper registry
    let aggregator = Arc::new(AggregationService::new(jobs.clone()));
    aggregator
        .register(Arc::new(RemoteFeedScraper::remoteok()))
        .await;
    for rules in known_boards() {
        aggregator.register(Arc::new(BoardScraper::new(rules))).await;
    }
    info!("Registered {} scrape sources", aggregator.sources().await.len());

    let matcher = Arc::new(MatchingService::new(jobs.clone(), users.clone()));

    // CV queue: durable broker when reachable, in-process channel otherwise.
    let cv_queue = select_queue(config.redis_url.as_deref()).await;

    // Object storage for uploaded documents.
    let storage: Option<Arc<dyn ObjectStore>> = match S3ObjectStore::from_config(&config).await {
        Some(store) => {
            info!("Object storage initialized (bucket: {})", config.documents_bucket);
            Some(Arc::new(store))
        }
        None => None,
    };

    // AI collaborator; absent key degrades the worker to ai_unavailable.
    let analyzer: Option<Arc<dyn CvAnalyzer>> = config.gemini_api_key.clone().map(|key| {
        info!("AI client initialized (model: {})", config.gemini_model);
        Arc::new(GeminiClient::new(key, &config.gemini_model, config.gemini_rpm))
            as Arc<dyn CvAnalyzer>
    });

    let shutdown = CancellationToken::new();

    // CV worker, only when it can actually read documents.
    if let Some(store) = storage.clone() {
        let worker = CvWorker::new(
            cv_queue.clone(),
            cvs.clone(),
            store,
            Arc::new(PdfTextExtractor),
            analyzer,
        );
        let worker_ctx = shutdown.clone();
        tokio::spawn(async move { worker.run(worker_ctx).await });
    } else {
        info!("CV worker not started: object storage unavailable");
    }

    let state = AppState {
        jobs,
        cvs,
        users,
        aggregator,
        matcher,
        cv_queue,
        storage,
        config: config.clone(),
        shutdown: shutdown.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
