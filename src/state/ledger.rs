use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use crate::error::Result;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of "now" in Unix seconds.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Clock that only moves when told to.
#[cfg(test)]
#[derive(Default)]
pub struct ManualClock {
    now: AtomicU64,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start_secs: u64) -> Arc<Self> {
        Arc::new(Self { now: AtomicU64::new(start_secs) })
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::Relaxed);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// DedupLedger
// ---------------------------------------------------------------------------

/// Per-listing memory across cycles.
///
/// *Sent* is permanent: once a listing produced a notification it never does
/// again. *Checked* is a throttle: a listing inspected less than `ttl_secs`
/// ago is not fetched again.
#[async_trait]
pub trait DedupLedger: Send + Sync {
    async fn is_sent(&self, identity: &str) -> Result<bool>;

    /// Idempotent.
    async fn mark_sent(&self, identity: &str) -> Result<()>;

    /// True iff a check was recorded and `now - checked_at < ttl_secs`.
    async fn is_checked_recent(&self, identity: &str, ttl_secs: u64) -> Result<bool>;

    /// Records "checked now", replacing an older timestamp.
    async fn mark_checked(&self, identity: &str) -> Result<()>;

    /// Drops checks that are no longer fresh. Returns how many were removed.
    async fn prune_checked(&self, ttl_secs: u64) -> Result<u64>;

    async fn sent_count(&self) -> Result<u64>;
}

pub(crate) fn is_fresh(checked_at: u64, now: u64, ttl_secs: u64) -> bool {
    now.saturating_sub(checked_at) < ttl_secs
}

// ---------------------------------------------------------------------------
// MemoryLedger
// ---------------------------------------------------------------------------

pub struct MemoryLedger {
    clock: Arc<dyn Clock>,
    sent: DashSet<String>,
    /// identity → last check (Unix seconds)
    checked: DashMap<String, u64>,
}

impl MemoryLedger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            sent: DashSet::new(),
            checked: DashMap::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn checked_len(&self) -> usize {
        self.checked.len()
    }
}

#[async_trait]
impl DedupLedger for MemoryLedger {
    async fn is_sent(&self, identity: &str) -> Result<bool> {
        Ok(self.sent.contains(identity))
    }

    async fn mark_sent(&self, identity: &str) -> Result<()> {
        self.sent.insert(identity.to_string());
        Ok(())
    }

    async fn is_checked_recent(&self, identity: &str, ttl_secs: u64) -> Result<bool> {
        let now = self.clock.now_secs();
        Ok(self
            .checked
            .get(identity)
            .is_some_and(|at| is_fresh(*at, now, ttl_secs)))
    }

    async fn mark_checked(&self, identity: &str) -> Result<()> {
        let now = self.clock.now_secs();
        let mut at = self.checked.entry(identity.to_string()).or_insert(now);
        // never move backwards
        if now > *at {
            *at = now;
        }
        Ok(())
    }

    async fn prune_checked(&self, ttl_secs: u64) -> Result<u64> {
        let now = self.clock.now_secs();
        let before = self.checked.len();
        self.checked.retain(|_, at| is_fresh(*at, now, ttl_secs));
        Ok(before.saturating_sub(self.checked.len()) as u64)
    }

    async fn sent_count(&self) -> Result<u64> {
        Ok(self.sent.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: u64 = 1800;

    #[tokio::test]
    async fn mark_sent_twice_is_harmless() {
        let ledger = MemoryLedger::new(ManualClock::new(0));
        ledger.mark_sent("a").await.unwrap();
        ledger.mark_sent("a").await.unwrap();
        assert!(ledger.is_sent("a").await.unwrap());
        assert!(!ledger.is_sent("b").await.unwrap());
        assert_eq!(ledger.sent_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn checked_is_recent_until_ttl_elapses() {
        let clock = ManualClock::new(1_000);
        let ledger = MemoryLedger::new(clock.clone());

        assert!(!ledger.is_checked_recent("a", TTL).await.unwrap());

        ledger.mark_checked("a").await.unwrap();
        assert!(ledger.is_checked_recent("a", TTL).await.unwrap());

        clock.advance(TTL - 1);
        assert!(ledger.is_checked_recent("a", TTL).await.unwrap());

        clock.advance(1);
        assert!(!ledger.is_checked_recent("a", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn recheck_resets_the_window() {
        let clock = ManualClock::new(0);
        let ledger = MemoryLedger::new(clock.clone());
        ledger.mark_checked("a").await.unwrap();
        clock.advance(TTL);
        ledger.mark_checked("a").await.unwrap();
        assert!(ledger.is_checked_recent("a", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn prune_drops_only_expired_checks() {
        let clock = ManualClock::new(0);
        let ledger = MemoryLedger::new(clock.clone());
        ledger.mark_checked("old").await.unwrap();
        clock.advance(TTL);
        ledger.mark_checked("new").await.unwrap();

        assert_eq!(ledger.prune_checked(TTL).await.unwrap(), 1);
        assert_eq!(ledger.checked_len(), 1);
        assert!(ledger.is_checked_recent("new", TTL).await.unwrap());
        assert_eq!(ledger.prune_checked(TTL).await.unwrap(), 0);
    }

    #[test]
    fn freshness_tolerates_clock_skew() {
        // a timestamp from the future counts as fresh
        assert!(is_fresh(2_000, 1_000, TTL));
        assert!(!is_fresh(0, TTL, TTL));
    }
}
