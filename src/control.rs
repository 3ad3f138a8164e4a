//! Operator commands for the reference-price table.
//!
//! ```text
//! /setprice <generation> <tier> <storage> <price>
//! /getprice <generation> <tier> <storage>
//! ```
//!
//! The tier may span several words (`pro max`), may be quoted, and may use
//! hyphens (`pro-max`). `promax` is also accepted.

use tracing::info;

use crate::error::Result;
use crate::state::{MarketPriceStore, PriceKey};
use crate::types::{Generation, Tier, STORAGE_CAPACITIES_DESC};

pub const USAGE: &str = "Usage:\n\
    /setprice <generation> <tier> <storage> <price>\n\
    /getprice <generation> <tier> <storage>\n\
    generation: 12-16, tier: base | pro | pro max, storage: 128 | 256 | 512\n\
    Example: /setprice 13 \"pro max\" 256 2100";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetPrice { key: PriceKey, price: u32 },
    GetPrice { key: PriceKey },
}

/// `None` for anything that is not a well-formed command.
pub fn parse_command(text: &str) -> Option<Command> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let (head, args) = tokens.split_first()?;
    // "/setprice@SomeBot" as sent in group chats
    let name = head.split('@').next()?.to_lowercase();

    match name.as_str() {
        "/setprice" => {
            let (price, rest) = args.split_last()?;
            let key = parse_key(rest)?;
            let price: u32 = price.parse().ok().filter(|p| *p > 0)?;
            Some(Command::SetPrice { key, price })
        }
        "/getprice" => Some(Command::GetPrice { key: parse_key(args)? }),
        _ => None,
    }
}

/// `<generation> <tier words...> <storage>`
fn parse_key(args: &[&str]) -> Option<PriceKey> {
    if args.len() < 3 {
        return None;
    }
    let generation: Generation = args[0].parse().ok()?;
    let tier = normalize_tier(&args[1..args.len() - 1].join(" "))?;
    let storage_gb = parse_storage(args[args.len() - 1])?;
    Some(PriceKey::new(generation, tier, storage_gb))
}

/// Strips quotes, turns hyphens into spaces, collapses whitespace, lowercases.
pub fn normalize_tier(raw: &str) -> Option<Tier> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '“' | '”'))
        .map(|c| if c == '-' { ' ' } else { c })
        .collect();
    let normalized = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    match normalized.as_str() {
        "promax" => Some(Tier::ProMax),
        other => other.parse().ok(),
    }
}

/// "256" or "256gb".
fn parse_storage(raw: &str) -> Option<u32> {
    let lower = raw.to_lowercase();
    let digits = lower.strip_suffix("gb").unwrap_or(&lower);
    let gb: u32 = digits.parse().ok()?;
    STORAGE_CAPACITIES_DESC.contains(&gb).then_some(gb)
}

/// Runs one command and returns the reply text. Malformed input gets [`USAGE`].
pub async fn execute(store: &dyn MarketPriceStore, text: &str) -> Result<String> {
    let Some(command) = parse_command(text) else {
        return Ok(USAGE.to_string());
    };

    match command {
        Command::SetPrice { key, price } => {
            store.set_price(key, price).await?;
            info!(model = %key, price, "Reference price updated");
            Ok(format!("✅ iPhone {key} = {price} PLN"))
        }
        Command::GetPrice { key } => Ok(match store.get_price(key).await? {
            Some(price) => format!("iPhone {key}: {price} PLN"),
            None => format!("No reference price for iPhone {key}"),
        }),
    }
}
