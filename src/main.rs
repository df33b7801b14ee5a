//! Process entry point: configuration, logging, storage, and the three
//! periodic pipeline operations behind one shared API gate.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::info;

use dealcast::application::discovery::DiscoveryScanner;
use dealcast::application::publisher::Publisher;
use dealcast::application::refresh::RefreshScanner;
use dealcast::application::scheduler::spawn_periodic;
use dealcast::infrastructure::catalog_record_repository::CatalogRecordRepository;
use dealcast::infrastructure::config::AppConfig;
use dealcast::infrastructure::database_connection::DatabaseConnection;
use dealcast::infrastructure::gateway::{RetryingGateway, TokioDelay};
use dealcast::infrastructure::logging::init_logging;
use dealcast::infrastructure::scan_cursor_repository::ScanCursorRepository;
use dealcast::infrastructure::storefront_client::{StorefrontClient, StorefrontClientConfig};
use dealcast::infrastructure::telegram::TelegramChannel;

const CONFIG_PATH: &str = "dealcast.json";

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(Path::new(CONFIG_PATH)).await?;
    init_logging(&config.logging)?;
    info!("Starting dealcast");

    let db = DatabaseConnection::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to open the record store")?;
    db.migrate().await.context("Failed to migrate the record store")?;

    let records = CatalogRecordRepository::new(db.pool().clone());
    let cursor = ScanCursorRepository::new(db.pool().clone());

    let client = Arc::new(StorefrontClient::new(StorefrontClientConfig {
        base_url: config.catalog.base_url.clone(),
        user_agent: config.catalog.user_agent.clone(),
        timeout_seconds: config.catalog.timeout_seconds,
        max_requests_per_second: config.catalog.max_requests_per_second,
    })?);
    let delay = Arc::new(TokioDelay);
    let retry_period = Duration::from_secs(config.catalog.retry_period_seconds);

    // One lock for all three operations: the catalog enforces a single
    // global rate budget, so the runs must never overlap.
    let gate = Arc::new(Mutex::new(()));

    let gateway = |client: &Arc<StorefrontClient>| {
        RetryingGateway::new(
            Arc::clone(client),
            Arc::clone(&delay),
            config.catalog.region.clone(),
            config.catalog.retry_attempts,
            retry_period,
        )
    };

    let discovery = DiscoveryScanner::new(
        gateway(&client),
        records.clone(),
        cursor,
        Arc::clone(&gate),
        config.catalog.probe_count,
        config.catalog.insert_batch_size,
    );

    let refresh = RefreshScanner::new(
        gateway(&client),
        records.clone(),
        Arc::clone(&gate),
        config.catalog.update_limit,
    );

    let channel = TelegramChannel::new(config.channel.bot_token.clone(), config.channel.chat_id)?;
    let publisher = Publisher::new(
        gateway(&client),
        Arc::clone(&delay),
        channel,
        records,
        Arc::clone(&gate),
        (config.channel.publish_min, config.channel.publish_max),
        (config.channel.pacing_min_seconds, config.channel.pacing_max_seconds),
        fastrand::Rng::new(),
    );

    let _discovery_task =
        spawn_periodic(discovery, Duration::from_secs(config.schedule.discovery_interval_seconds));
    let _refresh_task =
        spawn_periodic(refresh, Duration::from_secs(config.schedule.refresh_interval_seconds));
    let _publish_task =
        spawn_periodic(publisher, Duration::from_secs(config.schedule.publish_interval_seconds));

    tokio::signal::ctrl_c().await.context("Failed to listen for the shutdown signal")?;
    info!("Shutdown signal received, exiting");
    Ok(())
}
