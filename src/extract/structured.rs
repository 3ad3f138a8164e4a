//! Attribute extraction from the detail page's labelled parameter list.
//!
//! Labels are the marketplace's Polish ones, lowercased by the parser. This
//! extractor never looks at the title; merging with free-text results is the
//! caller's job (see [`super::resolve`]).

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::text::{resolve_tier, GENERATION_RE};
use crate::types::{Generation, ParamValue, Tier, STORAGE_CAPACITIES_DESC};

/// Capacity labels, tried in order.
pub const STORAGE_LABELS: &[&str] = &["wbudowana pamięć", "pamięć wbudowana", "pojemność", "pamięć"];

pub const MODEL_LABEL: &str = "model telefonu";

static GB_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\s*gb").expect("valid gb regex"));

/// Storage from the first capacity label that is present.
pub fn extract_storage(params: &BTreeMap<String, ParamValue>) -> Option<u32> {
    let value = STORAGE_LABELS
        .iter()
        .find_map(|label| params.get(*label))?
        .as_text()?;

    GB_RE
        .captures_iter(value)
        .filter_map(|c| c[1].parse::<u32>().ok())
        .find(|gb| STORAGE_CAPACITIES_DESC.contains(gb))
}

/// Generation and tier from the phone-model label only.
pub fn extract_model(params: &BTreeMap<String, ParamValue>) -> (Option<Generation>, Option<Tier>) {
    let Some(value) = params.get(MODEL_LABEL).and_then(ParamValue::as_text) else {
        return (None, None);
    };
    let v = value.to_lowercase();

    match GENERATION_RE
        .captures(&v)
        .and_then(|c| c[1].parse::<u8>().ok())
        .and_then(Generation::new)
    {
        Some(g) => (Some(g), Some(resolve_tier(&v))),
        None => (None, None),
    }
}
