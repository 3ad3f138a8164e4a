//! Row types matching `migrations/0001_initial.sql`.
//! Used by sqlx for typed queries.

use crate::state::{PriceEntry, PriceKey};
use crate::types::Generation;

#[derive(Debug, sqlx::FromRow)]
pub struct CheckedRow {
    pub url: String,
    pub checked_at: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct MarketPriceRow {
    pub generation: i64,
    pub tier: String,
    pub storage_gb: i64,
    pub price: i64,
    pub updated_at: i64,
}

impl TryFrom<MarketPriceRow> for PriceEntry {
    type Error = String;

    fn try_from(row: MarketPriceRow) -> Result<Self, Self::Error> {
        let generation = u8::try_from(row.generation)
            .ok()
            .and_then(Generation::new)
            .ok_or_else(|| format!("bad generation {}", row.generation))?;
        let tier = row.tier.parse()?;
        let storage_gb = u32::try_from(row.storage_gb)
            .map_err(|_| format!("bad storage {}", row.storage_gb))?;
        let price = u32::try_from(row.price).map_err(|_| format!("bad price {}", row.price))?;
        Ok(PriceEntry::new(PriceKey::new(generation, tier, storage_gb), price))
    }
}
