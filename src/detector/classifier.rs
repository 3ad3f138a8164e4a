use crate::state::PriceKey;
use crate::types::{ExtractedAttributes, Outcome, Tier};

/// Result of comparing an asking price against the reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceVerdict {
    NoMarket,
    NotCheaper,
    /// `profit` is always > 0.
    Cheaper { market_price: u32, profit: u32 },
}

impl PriceVerdict {
    /// Terminal outcome for this verdict.
    pub fn outcome(self) -> Outcome {
        match self {
            PriceVerdict::NoMarket => Outcome::NoMarket,
            PriceVerdict::NotCheaper => Outcome::NotCheaper,
            PriceVerdict::Cheaper { .. } => Outcome::Sent,
        }
    }
}

/// Table key for the extracted attributes, or the gap that stops evaluation.
/// Generation is checked before storage.
pub fn lookup_key(attrs: &ExtractedAttributes) -> Result<PriceKey, Outcome> {
    let Some(generation) = attrs.generation else {
        return Err(Outcome::NoModel);
    };
    let Some(storage_gb) = attrs.storage_gb else {
        return Err(Outcome::NoStorage);
    };
    Ok(PriceKey::new(generation, attrs.tier.unwrap_or(Tier::Base), storage_gb))
}

/// A zero reference price counts as missing.
pub fn compare_price(list_price: u32, market_price: Option<u32>) -> PriceVerdict {
    match market_price {
        None | Some(0) => PriceVerdict::NoMarket,
        Some(market) if list_price >= market => PriceVerdict::NotCheaper,
        Some(market) => PriceVerdict::Cheaper {
            market_price: market,
            profit: market - list_price,
        },
    }
}
