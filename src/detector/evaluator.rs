use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::api::latency::LatencyStats;
use crate::detector::classifier::{self, PriceVerdict};
use crate::error::Result;
use crate::extract;
use crate::fetcher::ListingSource;
use crate::notifier::Notifier;
use crate::state::{DedupLedger, MarketPriceStore};
use crate::types::{Deal, ListingSummary, Outcome};

/// What happened to one listing that was not already sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Checked within the recheck window; nothing fetched.
    Throttled,
    Finished(Outcome),
}

/// Decides whether one listing is a deal and, if so, records and delivers it.
pub struct DealEvaluator {
    source: Arc<dyn ListingSource>,
    prices: Arc<dyn MarketPriceStore>,
    ledger: Arc<dyn DedupLedger>,
    notifier: Notifier,
    latency: Arc<LatencyStats>,
    check_ttl_secs: u64,
}

impl DealEvaluator {
    pub fn new(
        source: Arc<dyn ListingSource>,
        prices: Arc<dyn MarketPriceStore>,
        ledger: Arc<dyn DedupLedger>,
        notifier: Notifier,
        latency: Arc<LatencyStats>,
        check_ttl_secs: u64,
    ) -> Self {
        Self { source, prices, ledger, notifier, latency, check_ttl_secs }
    }

    pub fn check_ttl_secs(&self) -> u64 {
        self.check_ttl_secs
    }

    /// A failed detail fetch leaves the listing unchecked so the next cycle
    /// retries it. Once the page is in hand the listing is marked checked
    /// before any outcome is decided.
    pub async fn evaluate(&self, listing: &ListingSummary) -> Result<Evaluation> {
        let identity = listing.identity.as_str();

        if self.ledger.is_checked_recent(identity, self.check_ttl_secs).await? {
            debug!(identity, "Checked recently, skipping");
            return Ok(Evaluation::Throttled);
        }

        let started = Instant::now();
        let detail = self.source.fetch_detail(listing).await?;
        self.latency.record(started.elapsed());
        self.ledger.mark_checked(identity).await?;

        let attrs = extract::resolve(listing, &detail);
        let key = match classifier::lookup_key(&attrs) {
            Ok(key) => key,
            Err(outcome) => return Ok(self.finish(listing, outcome)),
        };

        let market_price = self.prices.get_price(key).await?;
        let (market_price, profit) = match classifier::compare_price(listing.list_price, market_price) {
            PriceVerdict::Cheaper { market_price, profit } => (market_price, profit),
            verdict => return Ok(self.finish(listing, verdict.outcome())),
        };

        let deal = Deal {
            summary: listing.clone(),
            detail,
            generation: key.generation,
            tier: key.tier,
            storage_gb: key.storage_gb,
            market_price,
            profit,
        };

        // Sent is recorded before any delivery attempt.
        self.ledger.mark_sent(identity).await?;

        info!(
            event = "DEAL",
            identity,
            model = %key,
            list_price = listing.list_price,
            market_price,
            profit,
            "Deal: {} at {} PLN (market {} PLN, +{} PLN)",
            listing.title,
            listing.list_price,
            market_price,
            profit,
        );
        self.notifier.notify(&deal).await;

        Ok(Evaluation::Finished(Outcome::Sent))
    }

    fn finish(&self, listing: &ListingSummary, outcome: Outcome) -> Evaluation {
        debug!(identity = %listing.identity, %outcome, "Listing skipped");
        Evaluation::Finished(outcome)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::fetcher::testing::ScriptedSource;
    use crate::notifier::testing::RecordingChannel;
    use crate::pacing::FixedDelay;
    use crate::state::{ManualClock, MemoryLedger, MemoryPriceTable, PriceKey};
    use crate::types::{Generation, ListingDetail, ParamValue, Tier};

    pub(crate) struct Harness {
        pub source: Arc<ScriptedSource>,
        pub prices: Arc<MemoryPriceTable>,
        pub ledger: Arc<MemoryLedger>,
        pub channel: Arc<RecordingChannel>,
        pub clock: Arc<ManualClock>,
        pub latency: Arc<LatencyStats>,
    }

    impl Harness {
        pub(crate) fn new() -> Self {
            let clock = ManualClock::new(1_000_000);
            Self {
                source: Arc::new(ScriptedSource::default()),
                prices: Arc::new(MemoryPriceTable::new()),
                ledger: Arc::new(MemoryLedger::new(clock.clone())),
                channel: Arc::new(RecordingChannel::default()),
                clock,
                latency: Arc::new(LatencyStats::new()),
            }
        }

        pub(crate) fn evaluator(&self) -> DealEvaluator {
            let notifier = Notifier::new(self.channel.clone(), vec![1, 2], FixedDelay::none());
            DealEvaluator::new(
                self.source.clone(),
                self.prices.clone(),
                self.ledger.clone(),
                notifier,
                self.latency.clone(),
                1800,
            )
        }

        pub(crate) async fn set_price(&self, gen: u8, tier: Tier, storage_gb: u32, price: u32) {
            let key = PriceKey::new(Generation::new(gen).unwrap(), tier, storage_gb);
            self.prices.set_price(key, price).await.unwrap();
        }
    }

    pub(crate) fn listing(id: &str, title: &str, price: u32) -> ListingSummary {
        ListingSummary {
            identity: format!("https://www.olx.pl/d/oferta/{id}.html"),
            title: title.to_string(),
            list_price: price,
            thumbnail: None,
        }
    }

    fn detail_with_storage(storage: &str) -> ListingDetail {
        let mut raw_parameters = BTreeMap::new();
        raw_parameters.insert(
            "wbudowana pamięć".to_string(),
            ParamValue::Text(storage.to_string()),
        );
        ListingDetail {
            description: "Stan idealny".to_string(),
            raw_parameters,
            ..ListingDetail::default()
        }
    }

    #[tokio::test]
    async fn cheaper_listing_is_sent_once_to_every_recipient() {
        let h = Harness::new();
        h.set_price(12, Tier::ProMax, 128, 600).await;
        let ev = h.evaluator();
        let l = listing("a", "iPhone 12 Pro Max 128GB", 550);

        assert_eq!(ev.evaluate(&l).await.unwrap(), Evaluation::Finished(Outcome::Sent));
        assert!(h.ledger.is_sent(&l.identity).await.unwrap());
        assert_eq!(h.channel.recipients(), vec![1, 2]);

        let sent = h.channel.sent.lock().unwrap();
        let labels: Vec<&str> = sent[0].1.buttons.iter().flatten().map(|b| b.text.as_str()).collect();
        assert!(labels.contains(&"🤑 +50 PLN"));
        assert!(labels.contains(&"🏆 600 PLN"));
    }

    #[tokio::test]
    async fn priced_at_or_above_market_is_not_cheaper() {
        let h = Harness::new();
        h.set_price(13, Tier::Pro, 256, 600).await;
        let ev = h.evaluator();
        let l = listing("b", "iPhone 13 Pro 256 GB", 650);

        assert_eq!(ev.evaluate(&l).await.unwrap(), Evaluation::Finished(Outcome::NotCheaper));
        assert!(!h.ledger.is_sent(&l.identity).await.unwrap());
        assert!(h.channel.recipients().is_empty());
    }

    #[tokio::test]
    async fn unsupported_model_is_marked_checked_before_skip() {
        let h = Harness::new();
        let ev = h.evaluator();
        let l = listing("c", "iPhone 17 Ultra", 100);

        assert_eq!(ev.evaluate(&l).await.unwrap(), Evaluation::Finished(Outcome::NoModel));
        assert!(h.ledger.is_checked_recent(&l.identity, 1800).await.unwrap());
        assert_eq!(h.source.detail_calls(), 1);
    }

    #[tokio::test]
    async fn missing_storage_everywhere() {
        let h = Harness::new();
        let ev = h.evaluator();
        let l = listing("d", "iPhone 14 Pro", 1500);

        assert_eq!(ev.evaluate(&l).await.unwrap(), Evaluation::Finished(Outcome::NoStorage));
    }

    #[tokio::test]
    async fn storage_from_parameters_and_missing_price_entry() {
        let h = Harness::new();
        h.source
            .details
            .insert(listing("e", "", 0).identity, detail_with_storage("256 GB"));
        let ev = h.evaluator();
        let l = listing("e", "iPhone 15 Pro", 2000);

        assert_eq!(ev.evaluate(&l).await.unwrap(), Evaluation::Finished(Outcome::NoMarket));
    }

    #[tokio::test]
    async fn structured_storage_beats_title() {
        let h = Harness::new();
        h.set_price(14, Tier::Base, 512, 3000).await;
        h.source
            .details
            .insert(listing("f", "", 0).identity, detail_with_storage("512 GB"));
        let ev = h.evaluator();
        let l = listing("f", "iPhone 14 128GB", 2500);

        assert_eq!(ev.evaluate(&l).await.unwrap(), Evaluation::Finished(Outcome::Sent));
    }

    #[tokio::test]
    async fn recheck_window_throttles_until_it_expires() {
        let h = Harness::new();
        let ev = h.evaluator();
        let l = listing("g", "iPhone 14 Pro", 1500);

        ev.evaluate(&l).await.unwrap();
        h.clock.advance(1799);
        assert_eq!(ev.evaluate(&l).await.unwrap(), Evaluation::Throttled);
        assert_eq!(h.source.detail_calls(), 1);

        h.clock.advance(1);
        assert_eq!(ev.evaluate(&l).await.unwrap(), Evaluation::Finished(Outcome::NoStorage));
        assert_eq!(h.source.detail_calls(), 2);
    }

    #[tokio::test]
    async fn failed_detail_fetch_is_retried_next_time() {
        let h = Harness::new();
        h.set_price(12, Tier::Base, 128, 600).await;
        let l = listing("h", "iPhone 12 128GB", 500);
        h.source.broken.insert(l.identity.clone());
        let ev = h.evaluator();

        assert!(ev.evaluate(&l).await.is_err());
        assert!(!h.ledger.is_checked_recent(&l.identity, 1800).await.unwrap());
        assert_eq!(h.latency.snapshot().samples, 0);

        h.source.broken.remove(&l.identity);
        h.clock.advance(60);
        assert_eq!(ev.evaluate(&l).await.unwrap(), Evaluation::Finished(Outcome::Sent));
        assert_eq!(h.source.detail_calls(), 2);
    }

    #[tokio::test]
    async fn detail_fetch_latency_is_recorded() {
        let h = Harness::new();
        let ev = h.evaluator();
        ev.evaluate(&listing("i", "iPhone 16", 100)).await.unwrap();
        assert_eq!(h.latency.snapshot().samples, 1);
    }
}
