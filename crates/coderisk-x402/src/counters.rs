//! Process-wide usage counters.
//!
//! The only mutable shared state besides the replay ledger. Monotonically
//! incremented, never reset; a restart starts from zero.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct UsageCounters {
    total_requests: AtomicU64,
    paid_requests: AtomicU64,
}

impl UsageCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an admission attempt, whatever its outcome.
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an admission that was paid for — or granted by a verified
    /// bypass, which is accounted as if paid.
    pub fn record_paid(&self) {
        self.paid_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            paid_requests: self.paid_requests.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub total_requests: u64,
    pub paid_requests: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_independently() {
        let counters = UsageCounters::new();
        counters.record_request();
        counters.record_request();
        counters.record_paid();

        let snap = counters.snapshot();
        assert_eq!(snap.total_requests, 2);
        assert_eq!(snap.paid_requests, 1);
    }
}
