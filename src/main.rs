//! Engine entry point: config, database, background scheduler.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tender_engine::config::AppConfig;
use tender_engine::db::Database;
use tender_engine::services::{
    AesGcmCipher, ArchiveService, AutoCloseSweep, Clock, Scheduler, SystemClock,
};
use tender_engine::store::PgStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    info!("Starting tender engine...");

    let db = Database::connect(&config.database_url).await?;
    db.run_migrations().await?;
    let store = PgStore::new(db);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cipher = AesGcmCipher::from_secret(&config.archive_secret)?;
    let archive = ArchiveService::new(
        store.clone(),
        cipher,
        Arc::clone(&clock),
        config.archive_retention_years,
    );
    let sweep = AutoCloseSweep::new(store.clone(), config.sweep_batch_limit);

    let scheduler = Scheduler::new(
        sweep,
        archive,
        clock,
        Duration::from_secs(config.sweep_interval_secs),
        Duration::from_secs(config.archive_expiry_interval_secs),
    );
    let handle = scheduler.start();

    info!("Tender engine running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received");
    scheduler.stop();
    if let Err(e) = handle.await {
        error!("Scheduler task ended abnormally: {}", e);
    }

    info!("Tender engine stopped");
    Ok(())
}
