use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthState;
use crate::api::latency::{LatencySnapshot, LatencyStats};
use crate::control;
use crate::crawl_cycle::CycleReport;
use crate::error::AppError;
use crate::state::{DedupLedger, MarketPriceStore, PriceEntry, PriceKey};
use crate::types::{Generation, STORAGE_CAPACITIES_DESC};

#[derive(Clone)]
pub struct ApiState {
    pub prices: Arc<dyn MarketPriceStore>,
    pub ledger: Arc<dyn DedupLedger>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/prices", get(get_prices).put(put_price))
        .route("/prices/:generation/:tier/:storage", get(get_price))
        .route("/commands", post(post_command))
        .route("/health", get(get_health))
        .route("/stats/summary", get(get_stats_summary))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CommandRequest {
    pub text: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub last_cycle_at_secs: Option<u64>,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub sent_total: u64,
    pub reference_prices: usize,
    pub last_cycle: Option<CycleReport>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_prices(State(state): State<ApiState>) -> Result<Json<Vec<PriceEntry>>, AppError> {
    Ok(Json(state.prices.all_prices().await?))
}

/// Tier in the path accepts the same spellings as the chat commands.
async fn get_price(
    State(state): State<ApiState>,
    Path((generation, tier, storage)): Path<(u8, String, u32)>,
) -> Result<Json<PriceEntry>, AppError> {
    let generation = Generation::try_from(generation).map_err(AppError::Validation)?;
    let tier = control::normalize_tier(&tier)
        .ok_or_else(|| AppError::Validation(format!("unknown tier: {tier}")))?;
    let key = PriceKey::new(generation, tier, storage);

    match state.prices.get_price(key).await? {
        Some(price) => Ok(Json(PriceEntry::new(key, price))),
        None => Err(AppError::NotFound(format!("no reference price for {key}"))),
    }
}

async fn put_price(
    State(state): State<ApiState>,
    Json(entry): Json<PriceEntry>,
) -> Result<Json<PriceEntry>, AppError> {
    if !STORAGE_CAPACITIES_DESC.contains(&entry.storage_gb) {
        return Err(AppError::Validation(format!(
            "unsupported storage: {} GB",
            entry.storage_gb
        )));
    }
    if entry.price == 0 {
        return Err(AppError::Validation("price must be positive".to_string()));
    }
    state.prices.set_price(entry.key(), entry.price).await?;
    Ok(Json(entry))
}

async fn post_command(
    State(state): State<ApiState>,
    Json(req): Json<CommandRequest>,
) -> Result<String, AppError> {
    control::execute(state.prices.as_ref(), &req.text).await
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let last = state.health.last_cycle_at_secs();
    Json(HealthResponse {
        status: "ok",
        cycles_completed: state.health.cycles_completed(),
        cycles_failed: state.health.cycles_failed(),
        last_cycle_at_secs: (last > 0).then_some(last),
    })
}

async fn get_stats_summary(
    State(state): State<ApiState>,
) -> Result<Json<SummaryResponse>, AppError> {
    let sent_total = state.ledger.sent_count().await?;
    let reference_prices = state.prices.all_prices().await?.len();

    Ok(Json(SummaryResponse {
        cycles_completed: state.health.cycles_completed(),
        cycles_failed: state.health.cycles_failed(),
        sent_total,
        reference_prices,
        last_cycle: state.health.last_report(),
    }))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencySnapshot> {
    Json(state.latency.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl_cycle::CycleStats;
    use crate::state::{ManualClock, MemoryLedger, MemoryPriceTable};
    use crate::types::Tier;

    fn state() -> ApiState {
        ApiState {
            prices: Arc::new(MemoryPriceTable::new()),
            ledger: Arc::new(MemoryLedger::new(ManualClock::new(0))),
            health: Arc::new(HealthState::new()),
            latency: Arc::new(LatencyStats::new()),
        }
    }

    fn entry(gen: u8, tier: Tier, storage_gb: u32, price: u32) -> PriceEntry {
        let key = PriceKey::new(Generation::new(gen).unwrap(), tier, storage_gb);
        PriceEntry::new(key, price)
    }

    #[tokio::test]
    async fn put_then_get_price() {
        let s = state();
        put_price(State(s.clone()), Json(entry(13, Tier::ProMax, 256, 2100)))
            .await
            .unwrap();

        let Json(found) = get_price(State(s.clone()), Path((13, "pro-max".to_string(), 256)))
            .await
            .unwrap();
        assert_eq!(found.price, 2100);

        let Json(all) = get_prices(State(s)).await.unwrap();
        assert_eq!(all, vec![entry(13, Tier::ProMax, 256, 2100)]);
    }

    #[tokio::test]
    async fn missing_price_is_not_found() {
        let err = get_price(State(state()), Path((12, "base".to_string(), 128)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn bad_path_and_body_are_rejected() {
        let s = state();
        let err = get_price(State(s.clone()), Path((11, "pro".to_string(), 128)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = put_price(State(s.clone()), Json(entry(12, Tier::Pro, 64, 900)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = put_price(State(s), Json(entry(12, Tier::Pro, 128, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn command_endpoint_replies_in_text() {
        let s = state();
        let reply = post_command(
            State(s.clone()),
            Json(CommandRequest { text: "/setprice 16 base 128 3500".to_string() }),
        )
        .await
        .unwrap();
        assert!(reply.contains("3500 PLN"));

        let Json(all) = get_prices(State(s)).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn summary_reports_last_cycle() {
        let s = state();
        s.ledger.mark_sent("https://www.olx.pl/d/oferta/a").await.unwrap();
        s.health.record_cycle(CycleReport {
            finished_at_secs: 1_700_000_000,
            duration_ms: 1200,
            stats: CycleStats { listed: 40, sent: 1, ..CycleStats::default() },
        });

        let Json(summary) = get_stats_summary(State(s.clone())).await.unwrap();
        assert_eq!(summary.sent_total, 1);
        assert_eq!(summary.cycles_completed, 1);
        assert_eq!(summary.last_cycle.unwrap().stats.listed, 40);

        let Json(health) = get_health(State(s)).await;
        assert_eq!(health.last_cycle_at_secs, Some(1_700_000_000));
    }
}
