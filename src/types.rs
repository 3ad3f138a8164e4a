use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Phone attributes
// ---------------------------------------------------------------------------

/// Product-line number of the phone. Only 12 through 16 are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Generation(u8);

impl Generation {
    pub const SUPPORTED: [u8; 5] = [12, 13, 14, 15, 16];

    pub fn new(n: u8) -> Option<Self> {
        Self::SUPPORTED.contains(&n).then_some(Self(n))
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Generation {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Generation::new(n).ok_or_else(|| format!("unsupported generation {n}"))
    }
}

impl From<Generation> for u8 {
    fn from(g: Generation) -> u8 {
        g.0
    }
}

impl FromStr for Generation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n = s
            .trim()
            .parse::<u8>()
            .map_err(|_| format!("not a generation: {s}"))?;
        Generation::try_from(n)
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "base")]
    Base,
    #[serde(rename = "pro")]
    Pro,
    #[serde(rename = "pro max")]
    ProMax,
}

impl Tier {
    /// Exact stored form: "base", "pro" or "pro max".
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Base => "base",
            Tier::Pro => "pro",
            Tier::ProMax => "pro max",
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base" => Ok(Tier::Base),
            "pro" => Ok(Tier::Pro),
            "pro max" => Ok(Tier::ProMax),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage capacities we price, largest first.
pub const STORAGE_CAPACITIES_DESC: [u32; 3] = [512, 256, 128];

/// Whatever could be read off a listing. Any field may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractedAttributes {
    pub generation: Option<Generation>,
    pub tier: Option<Tier>,
    pub storage_gb: Option<u32>,
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// One card from the listing index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingSummary {
    /// Canonical listing URL; stable and unique per ad.
    pub identity: String,
    pub title: String,
    pub list_price: u32,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamValue {
    Text(String),
    /// Label shown without a value, e.g. "Prywatne".
    Flag,
}

impl ParamValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(t) => Some(t),
            ParamValue::Flag => None,
        }
    }
}

/// Fields read from a listing's detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingDetail {
    pub description: String,
    pub seller_name: String,
    pub location: String,
    /// lowercase label → value
    pub raw_parameters: BTreeMap<String, ParamValue>,
    pub primary_image: Option<String>,
}

/// A listing priced below its reference price, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deal {
    pub summary: ListingSummary,
    pub detail: ListingDetail,
    pub generation: Generation,
    pub tier: Tier,
    pub storage_gb: u32,
    pub market_price: u32,
    pub profit: u32,
}

impl Deal {
    /// Detail-page photo when present, else the index thumbnail.
    pub fn image(&self) -> Option<&str> {
        self.detail
            .primary_image
            .as_deref()
            .or(self.summary.thumbnail.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Evaluation outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Cheaper than market; notification sent.
    Sent,
    NoModel,
    NoStorage,
    /// No reference price for the combination.
    NoMarket,
    NotCheaper,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Sent => "sent",
            Outcome::NoModel => "no_model",
            Outcome::NoStorage => "no_storage",
            Outcome::NoMarket => "no_market",
            Outcome::NotCheaper => "not_cheaper",
        };
        write!(f, "{s}")
    }
}
