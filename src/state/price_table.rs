use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Generation, Tier};

/// Key of one reference-price row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PriceKey {
    pub generation: Generation,
    pub tier: Tier,
    pub storage_gb: u32,
}

impl PriceKey {
    pub fn new(generation: Generation, tier: Tier, storage_gb: u32) -> Self {
        Self { generation, tier, storage_gb }
    }
}

impl std::fmt::Display for PriceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}GB", self.generation, self.tier, self.storage_gb)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub generation: Generation,
    pub tier: Tier,
    pub storage_gb: u32,
    pub price: u32,
}

impl PriceEntry {
    pub fn new(key: PriceKey, price: u32) -> Self {
        Self {
            generation: key.generation,
            tier: key.tier,
            storage_gb: key.storage_gb,
            price,
        }
    }

    pub fn key(&self) -> PriceKey {
        PriceKey::new(self.generation, self.tier, self.storage_gb)
    }
}

/// Reference resale prices. Each get/set is atomic on its own; there is no
/// cross-call transaction.
#[async_trait]
pub trait MarketPriceStore: Send + Sync {
    async fn get_price(&self, key: PriceKey) -> Result<Option<u32>>;

    /// Upsert, last write wins.
    async fn set_price(&self, key: PriceKey, price: u32) -> Result<()>;

    /// Whole table, ordered by key.
    async fn all_prices(&self) -> Result<Vec<PriceEntry>>;
}

/// Built-in reference table (PLN): (generation, tier, [(storage_gb, price)]).
pub const DEFAULT_PRICES: &[(u8, Tier, &[(u32, u32)])] = &[
    (12, Tier::Pro, &[(128, 400), (256, 500), (512, 600)]),
    (12, Tier::ProMax, &[(128, 600), (256, 650), (512, 700)]),
    (13, Tier::Base, &[(128, 500), (256, 550)]),
    (13, Tier::Pro, &[(128, 700), (256, 800), (512, 1000)]),
    (13, Tier::ProMax, &[(128, 1000), (256, 1100), (512, 1200)]),
    (14, Tier::Base, &[(128, 700), (256, 800)]),
    (14, Tier::Pro, &[(128, 1200), (256, 1400), (512, 1600)]),
    (14, Tier::ProMax, &[(128, 1400), (256, 1700), (512, 1800)]),
    (15, Tier::Base, &[(128, 1200), (256, 1300)]),
    (15, Tier::Pro, &[(128, 1600), (256, 1700)]),
    (15, Tier::ProMax, &[(256, 2000), (512, 2200)]),
    (16, Tier::Base, &[(128, 1600), (256, 1700)]),
    (16, Tier::Pro, &[(128, 2500), (256, 2600), (512, 2800)]),
    (16, Tier::ProMax, &[(256, 3200), (512, 3400)]),
];

pub fn default_entries() -> Vec<PriceEntry> {
    DEFAULT_PRICES
        .iter()
        .filter_map(|&(gen, tier, rows)| Generation::new(gen).map(|g| (g, tier, rows)))
        .flat_map(|(generation, tier, rows)| {
            rows.iter().map(move |&(storage_gb, price)| {
                PriceEntry::new(PriceKey::new(generation, tier, storage_gb), price)
            })
        })
        .collect()
}

/// Upserts the built-in table. Rows outside it are left untouched.
/// Returns the number of rows written.
pub async fn seed_defaults(store: &dyn MarketPriceStore) -> Result<usize> {
    let entries = default_entries();
    for entry in &entries {
        store.set_price(entry.key(), entry.price).await?;
    }
    Ok(entries.len())
}

/// First-boot seeding: writes the built-in table only into an empty store, so
/// operator edits survive restarts. `None` when the store already had rows.
pub async fn seed_if_empty(store: &dyn MarketPriceStore) -> Result<Option<usize>> {
    if !store.all_prices().await?.is_empty() {
        return Ok(None);
    }
    seed_defaults(store).await.map(Some)
}

// ---------------------------------------------------------------------------
// MemoryPriceTable
// ---------------------------------------------------------------------------

/// Process-local price table.
#[derive(Default)]
pub struct MemoryPriceTable {
    prices: DashMap<PriceKey, u32>,
}

impl MemoryPriceTable {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarketPriceStore for MemoryPriceTable {
    async fn get_price(&self, key: PriceKey) -> Result<Option<u32>> {
        Ok(self.prices.get(&key).map(|p| *p))
    }

    async fn set_price(&self, key: PriceKey, price: u32) -> Result<()> {
        self.prices.insert(key, price);
        Ok(())
    }

    async fn all_prices(&self) -> Result<Vec<PriceEntry>> {
        let mut entries: Vec<PriceEntry> = self
            .prices
            .iter()
            .map(|e| PriceEntry::new(*e.key(), *e.value()))
            .collect();
        entries.sort_by_key(PriceEntry::key);
        Ok(entries)
    }
}
