mod api;
mod config;
mod control;
mod crawl_cycle;
mod db;
mod detector;
mod error;
mod extract;
mod fetcher;
mod notifier;
mod pacing;
mod parser;
mod state;
mod types;

use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::{Config, IN_MEMORY_DB};
use crate::crawl_cycle::CrawlCycleDriver;
use crate::db::SqliteStore;
use crate::detector::DealEvaluator;
use crate::error::Result;
use crate::fetcher::HtmlListingSource;
use crate::notifier::telegram::TelegramChannel;
use crate::notifier::Notifier;
use crate::pacing::FixedDelay;
use crate::state::price_table::seed_if_empty;
use crate::state::{
    Clock, DedupLedger, MarketPriceStore, MemoryLedger, MemoryPriceTable, SystemClock,
};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (prices, ledger) = open_stores(&cfg, clock.clone()).await?;

    if cfg.seed_prices {
        match seed_if_empty(prices.as_ref()).await? {
            Some(seeded) => info!("Seeded {seeded} reference prices"),
            None => info!("Reference price table already populated, not seeding"),
        }
    }

    // --- Collaborators ---
    let source = Arc::new(HtmlListingSource::new(&cfg)?);
    let channel = Arc::new(TelegramChannel::new(&cfg.telegram_api_url, &cfg.bot_token)?);
    let notifier = Notifier::new(
        channel,
        cfg.chat_ids.clone(),
        FixedDelay::from_millis(cfg.recipient_pacing_ms),
    );
    info!(recipients = cfg.chat_ids.len(), "Telegram delivery configured");

    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());

    let evaluator = DealEvaluator::new(
        source.clone(),
        prices.clone(),
        ledger.clone(),
        notifier,
        Arc::clone(&latency),
        cfg.check_ttl_secs,
    );
    let driver = CrawlCycleDriver::new(
        source,
        ledger.clone(),
        evaluator,
        FixedDelay::from_millis(cfg.deal_pacing_ms),
        Arc::clone(&health),
        clock,
        Duration::from_secs(cfg.cycle_interval_secs),
    );
    info!(
        interval_secs = cfg.cycle_interval_secs,
        check_ttl_secs = cfg.check_ttl_secs,
        "Crawling {}",
        cfg.listing_url,
    );
    tokio::spawn(async move { driver.run().await });

    // HTTP control surface
    let api_state = ApiState {
        prices,
        ledger,
        health,
        latency,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

/// SQLite at `DB_PATH`, or process-local maps when it is `:memory:`.
async fn open_stores(
    cfg: &Config,
    clock: Arc<dyn Clock>,
) -> Result<(Arc<dyn MarketPriceStore>, Arc<dyn DedupLedger>)> {
    if cfg.db_path == IN_MEMORY_DB {
        warn!("DB_PATH is {IN_MEMORY_DB}: sent and checked listings are lost on restart");
        let prices: Arc<dyn MarketPriceStore> = Arc::new(MemoryPriceTable::new());
        let ledger: Arc<dyn DedupLedger> = Arc::new(MemoryLedger::new(clock));
        return Ok((prices, ledger));
    }

    let options = SqliteConnectOptions::new()
        .filename(&cfg.db_path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    let store = Arc::new(SqliteStore::new(pool, clock));
    let prices: Arc<dyn MarketPriceStore> = store.clone();
    let ledger: Arc<dyn DedupLedger> = store;
    Ok((prices, ledger))
}
