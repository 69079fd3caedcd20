//! Per-worker message counters
//!
//! Counters are atomics so the node can read them from the main thread while
//! the worker runs.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct WorkerStats {
    num_tx: AtomicU64,
    num_rx: AtomicU64,
    count: AtomicU64,
    overruns_seen: AtomicU64,
    publish_failures: AtomicU64,
}

/// Point-in-time copy of [`WorkerStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Messages published
    pub num_tx: u64,
    /// Messages popped from the worker's own queue
    pub num_rx: u64,
    /// Sequence number carried by the next produced message
    pub count: u64,
    /// Popped elements that reported a prior overrun
    pub overruns_seen: u64,
    /// Publishes where at least one destination rejected the message
    pub publish_failures: u64,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_rx(&self, had_overrun: bool) {
        self.num_rx.fetch_add(1, Ordering::Relaxed);
        if had_overrun {
            self.overruns_seen.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count one transmit attempt, advancing the message sequence
    pub fn record_tx(&self, publish_failed: bool) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.num_tx.fetch_add(1, Ordering::Relaxed);
        if publish_failed {
            self.publish_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            num_tx: self.num_tx.load(Ordering::Relaxed),
            num_rx: self.num_rx.load(Ordering::Relaxed),
            count: self.count.load(Ordering::Relaxed),
            overruns_seen: self.overruns_seen.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = WorkerStats::new();
        stats.record_rx(false);
        stats.record_rx(true);
        stats.record_tx(false);
        stats.record_tx(true);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.num_rx, 2);
        assert_eq!(snapshot.overruns_seen, 1);
        assert_eq!(snapshot.num_tx, 2);
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.publish_failures, 1);
    }
}
