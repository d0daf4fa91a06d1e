//! HTTP server for wenwend

use crate::admin;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::db::Database;
use crate::metrics::ChatMetrics;
use crate::pipeline::ChatPipeline;
use crate::routes;
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub catalog: Arc<Catalog>,
    pub pipeline: Arc<ChatPipeline>,
    pub metrics: ChatMetrics,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let metrics = ChatMetrics::new().context("Failed to register metrics")?;
        let catalog = Arc::new(Catalog::new(
            db.clone(),
            config.cache.capacity,
            Duration::from_secs(config.cache.ttl_secs),
        ));
        let pipeline = Arc::new(ChatPipeline::new(
            config.classifier()?,
            config.renderer(),
            catalog.clone(),
            metrics.clone(),
            config.chat.clone(),
            config.jobs.clone(),
        ));

        Ok(Self {
            config,
            db,
            catalog,
            pipeline,
            metrics,
            start_time: Instant::now(),
        })
    }
}

/// All routes with state and tracing attached
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::chat_routes())
        .merge(routes::user_routes())
        .merge(routes::job_routes())
        .merge(routes::health_routes())
        .merge(admin::admin_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server
pub async fn run(state: AppState) -> Result<()> {
    let addr = state.config.server.bind_addr.clone();
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("  Listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
