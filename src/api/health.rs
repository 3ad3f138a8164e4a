//! Shared health state for the /health and /stats endpoints.
//! Updated by the crawl cycle driver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::crawl_cycle::CycleReport;

/// Cycle counters and the most recent report. Written by the driver, read by API.
#[derive(Default)]
pub struct HealthState {
    pub cycles_completed: AtomicU64,
    pub cycles_failed: AtomicU64,
    /// Unix seconds of the last cycle attempt (0 = none yet).
    pub last_cycle_at_secs: AtomicU64,
    last_report: Mutex<Option<CycleReport>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self, report: CycleReport) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        self.last_cycle_at_secs.store(report.finished_at_secs, Ordering::Relaxed);
        if let Ok(mut last) = self.last_report.lock() {
            *last = Some(report);
        }
    }

    pub fn record_failure(&self, at_secs: u64) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        self.last_cycle_at_secs.store(at_secs, Ordering::Relaxed);
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::Relaxed)
    }

    pub fn cycles_failed(&self) -> u64 {
        self.cycles_failed.load(Ordering::Relaxed)
    }

    pub fn last_cycle_at_secs(&self) -> u64 {
        self.last_cycle_at_secs.load(Ordering::Relaxed)
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report.lock().ok().and_then(|r| r.clone())
    }
}
