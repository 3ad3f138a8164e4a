use crate::error::{AppError, Result};

pub const LISTING_URL: &str = "https://www.olx.pl/elektronika/telefony/smartfony-telefony-komorkowe/iphone/warszawa/?search%5Bdist%5D=300";
pub const SITE_ORIGIN: &str = "https://www.olx.pl";
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Listing-index fetch timeout (seconds).
pub const INDEX_TIMEOUT_SECS: u64 = 15;

/// Detail-page fetch timeout (seconds).
pub const DETAIL_TIMEOUT_SECS: u64 = 20;

/// Telegram request timeout (seconds).
pub const DELIVERY_TIMEOUT_SECS: u64 = 15;

/// Listing descriptions are cut to this many characters in notifications.
pub const MAX_DESC_LEN: usize = 600;

/// `DB_PATH` value that keeps all state in process memory.
pub const IN_MEMORY_DB: &str = ":memory:";

/// User-Agent pool; one is picked at random per request.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)",
    "Mozilla/5.0 (X11; Linux x86_64)",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    /// Telegram chat ids that receive every deal (CHAT_IDS, comma-separated)
    pub chat_ids: Vec<i64>,
    pub listing_url: String,
    pub site_origin: String,
    pub telegram_api_url: String,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Pause between two crawl cycles (CYCLE_INTERVAL_SECS)
    pub cycle_interval_secs: u64,
    /// How long a checked listing is left alone (CHECK_TTL_SECS)
    pub check_ttl_secs: u64,
    /// Pause after every delivered deal (DEAL_PACING_MS)
    pub deal_pacing_ms: u64,
    /// Pause between two recipients of the same deal (RECIPIENT_PACING_MS)
    pub recipient_pacing_ms: u64,
    /// Seed the built-in price table into an empty store at startup (SEED_PRICES)
    pub seed_prices: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bot_token = std::env::var("BOT_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::Config("BOT_TOKEN is not set".to_string()))?;

        let chat_ids = parse_chat_ids(&std::env::var("CHAT_IDS").unwrap_or_default())?;
        if chat_ids.is_empty() {
            return Err(AppError::Config("CHAT_IDS must list at least one chat id".to_string()));
        }

        Ok(Self {
            bot_token,
            chat_ids,
            listing_url: std::env::var("LISTING_URL").unwrap_or_else(|_| LISTING_URL.to_string()),
            site_origin: std::env::var("SITE_ORIGIN").unwrap_or_else(|_| SITE_ORIGIN.to_string()),
            telegram_api_url: std::env::var("TELEGRAM_API_URL")
                .unwrap_or_else(|_| TELEGRAM_API_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "ads.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            cycle_interval_secs: std::env::var("CYCLE_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse::<u64>()
                .unwrap_or(60),
            check_ttl_secs: std::env::var("CHECK_TTL_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse::<u64>()
                .unwrap_or(1800),
            deal_pacing_ms: std::env::var("DEAL_PACING_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse::<u64>()
                .unwrap_or(2000),
            recipient_pacing_ms: std::env::var("RECIPIENT_PACING_MS")
                .unwrap_or_else(|_| "300".to_string())
                .parse::<u64>()
                .unwrap_or(300),
            seed_prices: std::env::var("SEED_PRICES")
                .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(true),
        })
    }
}

fn parse_chat_ids(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| AppError::Config(format!("invalid chat id in CHAT_IDS: {s}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_ids_are_split_and_trimmed() {
        let ids = parse_chat_ids(" 454262931, 5429733148 ,,-100200").unwrap();
        assert_eq!(ids, vec![454262931, 5429733148, -100200]);
    }

    #[test]
    fn bad_chat_id_is_a_config_error() {
        let err = parse_chat_ids("123,abc").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
