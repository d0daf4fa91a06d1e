//! 高文文 daemon: chat API, admin back-office and the daily reset job.

use anyhow::{Context, Result};
use tracing::info;
use wenwen_shared::VersionInfo;
use wenwend::config::Config;
use wenwend::db::Database;
use wenwend::jobs::spawn_scheduler;
use wenwend::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("[BOOT] {} starting...", VersionInfo::current().signature());

    let config = Config::load().context("Failed to load configuration")?;
    let db = Database::open(&config.database.path)
        .with_context(|| format!("Failed to open {}", config.database.path.display()))?;
    info!("[BOOT] Database ready at {}", config.database.path.display());

    if config.jobs.scheduler_enabled {
        spawn_scheduler(db.clone(), config.jobs.clone());
        info!(
            "[BOOT] Daily reset scheduled at {:02}:00 (UTC{:+})",
            config.jobs.reset_hour, config.jobs.utc_offset_hours
        );
    }

    let state = AppState::new(config, db)?;
    server::run(state).await
}
