// Running counters for the session: rentals started, completed, canceled, expired.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub rentals_started: u64,
    pub rides_completed: u64,
    pub rentals_canceled: u64,
    pub rides_expired: u64,
    pub reassignments: u64,
    pub verification_failures: u64,
}

#[derive(Debug, Default)]
pub struct StatsCollector {
    rentals_started: AtomicU64,
    rides_completed: AtomicU64,
    rentals_canceled: AtomicU64,
    rides_expired: AtomicU64,
    reassignments: AtomicU64,
    verification_failures: AtomicU64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_started(&self) {
        self.rentals_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.rides_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_canceled(&self) {
        self.rentals_canceled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self) {
        self.rides_expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reassigned(&self) {
        self.reassignments.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_verification_failure(&self) {
        self.verification_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rentals_started: self.rentals_started.load(Ordering::Relaxed),
            rides_completed: self.rides_completed.load(Ordering::Relaxed),
            rentals_canceled: self.rentals_canceled.load(Ordering::Relaxed),
            rides_expired: self.rides_expired.load(Ordering::Relaxed),
            reassignments: self.reassignments.load(Ordering::Relaxed),
            verification_failures: self.verification_failures.load(Ordering::Relaxed),
        }
    }
}
