use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::detector::{DealEvaluator, Evaluation};
use crate::error::Result;
use crate::fetcher::ListingSource;
use crate::pacing::FixedDelay;
use crate::state::{Clock, DedupLedger};
use crate::types::Outcome;

/// Per-cycle tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    pub listed: usize,
    pub already_sent: usize,
    pub throttled: usize,
    pub sent: usize,
    pub no_model: usize,
    pub no_storage: usize,
    pub no_market: usize,
    pub not_cheaper: usize,
    pub errors: usize,
}

impl CycleStats {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Sent => self.sent += 1,
            Outcome::NoModel => self.no_model += 1,
            Outcome::NoStorage => self.no_storage += 1,
            Outcome::NoMarket => self.no_market += 1,
            Outcome::NotCheaper => self.not_cheaper += 1,
        }
    }

    /// Listings that reached a terminal outcome.
    pub fn evaluated(&self) -> usize {
        self.sent + self.no_model + self.no_storage + self.no_market + self.not_cheaper
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub finished_at_secs: u64,
    pub duration_ms: u64,
    pub stats: CycleStats,
}

pub struct CrawlCycleDriver {
    source: Arc<dyn ListingSource>,
    ledger: Arc<dyn DedupLedger>,
    evaluator: DealEvaluator,
    deal_pacer: FixedDelay,
    health: Arc<HealthState>,
    clock: Arc<dyn Clock>,
    cycle_interval: Duration,
}

impl CrawlCycleDriver {
    pub fn new(
        source: Arc<dyn ListingSource>,
        ledger: Arc<dyn DedupLedger>,
        evaluator: DealEvaluator,
        deal_pacer: FixedDelay,
        health: Arc<HealthState>,
        clock: Arc<dyn Clock>,
        cycle_interval: Duration,
    ) -> Self {
        Self {
            source,
            ledger,
            evaluator,
            deal_pacer,
            health,
            clock,
            cycle_interval,
        }
    }

    /// Runs a cycle immediately, then one per interval, forever.
    pub async fn run(self) {
        let mut ticker = interval(self.cycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.run_cycle().await {
                Ok(report) => self.health.record_cycle(report),
                Err(e) => {
                    error!("Crawl cycle failed: {e}");
                    self.health.record_failure(self.clock.now_secs());
                }
            }
        }
    }

    /// One pass over the current index. Only an index failure fails the cycle;
    /// per-listing errors are counted and the batch continues.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let started = Instant::now();
        let listings = self.source.fetch_index().await?;
        info!(count = listings.len(), "Crawl cycle started");

        let mut stats = CycleStats {
            listed: listings.len(),
            ..CycleStats::default()
        };

        for listing in &listings {
            match self.ledger.is_sent(&listing.identity).await {
                Ok(true) => {
                    stats.already_sent += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    stats.errors += 1;
                    warn!(identity = %listing.identity, "Sent lookup failed: {e}");
                    continue;
                }
            }

            match self.evaluator.evaluate(listing).await {
                Ok(Evaluation::Throttled) => stats.throttled += 1,
                Ok(Evaluation::Finished(outcome)) => {
                    stats.record(outcome);
                    if outcome == Outcome::Sent {
                        self.deal_pacer.wait().await;
                    }
                }
                Err(e) => {
                    stats.errors += 1;
                    warn!(identity = %listing.identity, "Listing evaluation failed: {e}");
                }
            }
        }

        match self.ledger.prune_checked(self.evaluator.check_ttl_secs()).await {
            Ok(0) => {}
            Ok(pruned) => debug!(pruned, "Expired checked entries removed"),
            Err(e) => warn!("Pruning checked entries failed: {e}"),
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            listed = stats.listed,
            already_sent = stats.already_sent,
            throttled = stats.throttled,
            sent = stats.sent,
            no_model = stats.no_model,
            no_storage = stats.no_storage,
            no_market = stats.no_market,
            not_cheaper = stats.not_cheaper,
            errors = stats.errors,
            duration_ms,
            "Crawl cycle complete: {} listed, {} evaluated, {} sent, {} errors",
            stats.listed,
            stats.evaluated(),
            stats.sent,
            stats.errors,
        );

        Ok(CycleReport {
            finished_at_secs: self.clock.now_secs(),
            duration_ms,
            stats,
        })
    }
}
