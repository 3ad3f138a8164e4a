//! Heuristics over free listing text (titles and descriptions).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{Generation, Tier, STORAGE_CAPACITIES_DESC};

/// Spellings sellers use for the product name.
const BRAND_TOKENS: &[&str] = &["iphone", "i phone", "ipone", "айфон", "apple iphone"];

const PRO_MAX_TOKENS: &[&str] = &["pro max", "promax", "pro-max"];

pub(crate) static GENERATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(12|13|14|15|16)\b").expect("valid generation regex"));

static STORAGE_GB_RES: Lazy<Vec<(u32, Regex)>> = Lazy::new(|| {
    STORAGE_CAPACITIES_DESC
        .iter()
        .map(|&gb| {
            let re = Regex::new(&format!(r"\b{gb}\s*gb\b")).expect("valid storage regex");
            (gb, re)
        })
        .collect()
});

static BARE_STORAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(128|256|512)\b").expect("valid bare storage regex"));

/// Reads generation and tier from a listing title.
///
/// The title must mention the brand or carry a standalone generation number.
/// Tier falls back to [`Tier::Base`] once a generation is found, so the pair
/// is either both present or both absent.
pub fn extract_model(title: &str) -> (Option<Generation>, Option<Tier>) {
    let t = title.to_lowercase();

    let generation = GENERATION_RE
        .captures(&t)
        .and_then(|c| c[1].parse::<u8>().ok())
        .and_then(Generation::new);

    let has_brand = BRAND_TOKENS.iter().any(|b| t.contains(b));
    if !has_brand && generation.is_none() {
        return (None, None);
    }

    match generation {
        Some(g) => (Some(g), Some(resolve_tier(&t))),
        None => (None, None),
    }
}

/// Tier by substring priority: pro max, then pro, else base.
/// Expects lowercase input.
pub(crate) fn resolve_tier(lowercase: &str) -> Tier {
    if PRO_MAX_TOKENS.iter().any(|p| lowercase.contains(p)) {
        Tier::ProMax
    } else if lowercase.contains("pro") {
        Tier::Pro
    } else {
        Tier::Base
    }
}

/// Finds a storage capacity in noisy text, largest capacity first.
pub fn extract_storage(text: &str) -> Option<u32> {
    let t = text.to_lowercase();

    // Pass 1: glued forms like "256gb" / "256g", spaces removed.
    let squashed = t.replace(' ', "");
    for gb in STORAGE_CAPACITIES_DESC {
        if squashed.contains(&format!("{gb}gb")) || squashed.contains(&format!("{gb}g")) {
            return Some(gb);
        }
    }

    // Pass 2: "<n> gb" on word boundaries.
    for (gb, re) in STORAGE_GB_RES.iter() {
        if re.is_match(&t) {
            return Some(*gb);
        }
    }

    // Pass 3: leftmost bare capacity number.
    BARE_STORAGE_RE
        .captures(&t)
        .and_then(|c| c[1].parse::<u32>().ok())
}

/// Keeps only the digits of a price label: "1 250 zł" → 1250. Values past
/// `u32::MAX` saturate so the card is still listed.
pub fn clean_price(text: &str) -> Option<u32> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    // only overflow can fail here
    Some(digits.parse::<u32>().unwrap_or(u32::MAX))
}
