//! Replay ledger: at-most-once acceptance per payment proof.

use dashmap::DashSet;

/// Trait for replay ledger backends.
///
/// Implementations must be thread-safe (`Send + Sync`). References are
/// normalized (lowercased) by the caller before they reach the ledger.
pub trait ReplayLedger: Send + Sync {
    /// Check whether a reference has already been consumed.
    fn is_consumed(&self, reference: &str) -> bool;

    /// Atomically consume a reference. Returns `true` if it was newly
    /// consumed, `false` if it had been consumed before (replay attempt).
    fn try_consume(&self, reference: &str) -> bool;
}

/// In-memory ledger backed by a concurrent set. Entries live for the process
/// lifetime and are never removed; a restart resets the ledger.
#[derive(Debug, Default)]
pub struct InMemoryReplayLedger {
    entries: DashSet<String>,
}

impl InMemoryReplayLedger {
    pub fn new() -> Self {
        Self {
            entries: DashSet::new(),
        }
    }

    /// Number of consumed references.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ReplayLedger for InMemoryReplayLedger {
    fn is_consumed(&self, reference: &str) -> bool {
        self.entries.contains(reference)
    }

    fn try_consume(&self, reference: &str) -> bool {
        // DashSet::insert is atomic within the process: exactly one caller
        // observes `true` for a given reference.
        self.entries.insert(reference.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_marks_reference() {
        let ledger = InMemoryReplayLedger::new();
        assert!(!ledger.is_consumed("0xabc"));
        assert!(ledger.try_consume("0xabc"));
        assert!(ledger.is_consumed("0xabc"));
    }

    #[test]
    fn second_consume_fails() {
        let ledger = InMemoryReplayLedger::new();
        assert!(ledger.try_consume("0xabc"));
        assert!(!ledger.try_consume("0xabc"));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn references_are_independent() {
        let ledger = InMemoryReplayLedger::new();
        assert!(ledger.try_consume("0xaaa"));
        assert!(!ledger.is_consumed("0xbbb"));
        assert!(ledger.try_consume("0xbbb"));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn concurrent_consumers_claim_exactly_once() {
        use std::sync::Arc;

        let ledger = Arc::new(InMemoryReplayLedger::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || ledger.try_consume("0xrace")));
        }
        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(wins, 1);
    }
}
