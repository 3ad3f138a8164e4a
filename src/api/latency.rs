//! Detail-page fetch timings, kept in an hdrhistogram for the /stats/latency
//! endpoint. Index fetches are not recorded.

use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::Histogram;
use serde::Serialize;

/// Longest fetch the histogram can hold; anything slower is clamped.
const MAX_TRACKED_MS: u64 = 120_000;

pub struct LatencyStats {
    fetches: Mutex<Histogram<u64>>,
}

/// Point-in-time view, milliseconds. Percentiles are `None` until the first
/// detail page has been fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LatencySnapshot {
    pub samples: u64,
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
    pub max_ms: Option<u64>,
}

impl LatencyStats {
    pub fn new() -> Self {
        // 1 ms .. MAX_TRACKED_MS at 3 significant figures always constructs.
        let fetches = Histogram::new_with_bounds(1, MAX_TRACKED_MS, 3)
            .expect("valid histogram bounds");
        Self {
            fetches: Mutex::new(fetches),
        }
    }

    /// Sub-millisecond fetches count as 1 ms.
    pub fn record(&self, elapsed: Duration) {
        let ms = (elapsed.as_millis() as u64).clamp(1, MAX_TRACKED_MS);
        if let Ok(mut h) = self.fetches.lock() {
            let _ = h.record(ms);
        }
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        let Ok(h) = self.fetches.lock() else {
            return LatencySnapshot::default();
        };
        if h.len() == 0 {
            return LatencySnapshot::default();
        }
        LatencySnapshot {
            samples: h.len(),
            p50_ms: Some(h.value_at_quantile(0.50)),
            p95_ms: Some(h.value_at_quantile(0.95)),
            p99_ms: Some(h.value_at_quantile(0.99)),
            max_ms: Some(h.max()),
        }
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}
