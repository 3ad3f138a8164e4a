use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::db::models::{CheckedRow, MarketPriceRow};
use crate::error::Result;
use crate::state::ledger::is_fresh;
use crate::state::{Clock, DedupLedger, MarketPriceStore, PriceEntry, PriceKey};

/// Durable ledger and price table over one SQLite pool.
///
/// Every method is a single statement, so each get/set is atomic at the
/// storage layer and the API can write prices while a cycle is reading them.
#[derive(Clone)]
pub struct SqliteStore {
    pool: sqlx::SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteStore {
    pub fn new(pool: sqlx::SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    fn now(&self) -> i64 {
        self.clock.now_secs() as i64
    }
}

#[async_trait]
impl DedupLedger for SqliteStore {
    async fn is_sent(&self, identity: &str) -> Result<bool> {
        let hit: Option<i64> = sqlx::query_scalar("SELECT 1 FROM sent_ads WHERE url = ?")
            .bind(identity)
            .fetch_optional(&self.pool)
            .await?;
        Ok(hit.is_some())
    }

    async fn mark_sent(&self, identity: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO sent_ads (url, sent_at) VALUES (?, ?)")
            .bind(identity)
            .bind(self.now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn is_checked_recent(&self, identity: &str, ttl_secs: u64) -> Result<bool> {
        let row: Option<CheckedRow> =
            sqlx::query_as("SELECT url, checked_at FROM checked_ads WHERE url = ?")
                .bind(identity)
                .fetch_optional(&self.pool)
                .await?;
        let now = self.clock.now_secs();
        Ok(row.is_some_and(|r| is_fresh(r.checked_at.max(0) as u64, now, ttl_secs)))
    }

    async fn mark_checked(&self, identity: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO checked_ads (url, checked_at) VALUES (?, ?)
            ON CONFLICT(url) DO UPDATE SET
                checked_at = MAX(checked_at, excluded.checked_at)
            "#,
        )
        .bind(identity)
        .bind(self.now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn prune_checked(&self, ttl_secs: u64) -> Result<u64> {
        let cutoff = self.now() - ttl_secs as i64;
        let done = sqlx::query("DELETE FROM checked_ads WHERE checked_at <= ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn sent_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sent_ads")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl MarketPriceStore for SqliteStore {
    async fn get_price(&self, key: PriceKey) -> Result<Option<u32>> {
        let price: Option<i64> = sqlx::query_scalar(
            "SELECT price FROM market_prices WHERE generation = ? AND tier = ? AND storage_gb = ?",
        )
        .bind(i64::from(key.generation.number()))
        .bind(key.tier.as_str())
        .bind(i64::from(key.storage_gb))
        .fetch_optional(&self.pool)
        .await?;
        Ok(price.and_then(|p| u32::try_from(p).ok()))
    }

    async fn set_price(&self, key: PriceKey, price: u32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO market_prices (generation, tier, storage_gb, price, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(generation, tier, storage_gb) DO UPDATE SET
                price = excluded.price,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(i64::from(key.generation.number()))
        .bind(key.tier.as_str())
        .bind(i64::from(key.storage_gb))
        .bind(i64::from(price))
        .bind(self.now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn all_prices(&self) -> Result<Vec<PriceEntry>> {
        let rows: Vec<MarketPriceRow> = sqlx::query_as(
            r#"
            SELECT generation, tier, storage_gb, price, updated_at
            FROM market_prices
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut entries: Vec<PriceEntry> = rows
            .into_iter()
            .filter_map(|row| match PriceEntry::try_from(row) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable market_prices row: {e}");
                    None
                }
            })
            .collect();
        entries.sort_by_key(PriceEntry::key);
        Ok(entries)
    }
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> sqlx::SqlitePool {
    // one connection: every new connection to :memory: is a fresh database
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations apply");
    pool
}
