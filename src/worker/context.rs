//! Worker descriptor
//!
//! A [`WorkerContext`] holds everything one worker thread needs: its queue,
//! the destinations it publishes to, its wake handle and counters. It is
//! built before any thread starts and then moved into the worker thread.

use crate::bus::{BusResult, Destinations, Queue, QueueOptions, WakeHandle};
use crate::worker::schedule::TxSchedule;
use crate::worker::stats::WorkerStats;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default bound of the timed wait at the top of each loop iteration
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(100);

/// Default delay between the startup rendezvous and the first transmit
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(2000);

/// Timing parameters of a worker's message loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub wait_timeout: Duration,
    pub schedule: TxSchedule,
    pub initial_delay: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            schedule: TxSchedule::default(),
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

#[derive(Debug)]
pub struct WorkerContext {
    name: String,
    queue: Arc<Queue>,
    destinations: Arc<Destinations>,
    wake: WakeHandle,
    stats: Arc<WorkerStats>,
    settings: LoopSettings,
    next_tx: Option<Instant>,
}

impl WorkerContext {
    /// Create the worker's queue and register its wake handle on it
    pub fn new(
        name: impl Into<String>,
        queue_capacity: usize,
        options: QueueOptions,
        settings: LoopSettings,
    ) -> BusResult<Self> {
        let name = name.into();
        let queue = Arc::new(Queue::new(name.clone(), queue_capacity, options)?);
        let wake = WakeHandle::new();
        queue.add_listener(&wake);

        Ok(Self {
            name,
            queue,
            destinations: Arc::new(Destinations::new()),
            wake,
            stats: Arc::new(WorkerStats::new()),
            settings,
            next_tx: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }

    pub fn destinations(&self) -> &Arc<Destinations> {
        &self.destinations
    }

    pub fn wake(&self) -> &WakeHandle {
        &self.wake
    }

    pub fn stats(&self) -> &Arc<WorkerStats> {
        &self.stats
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn next_tx(&self) -> Option<Instant> {
        self.next_tx
    }

    /// Have `subscriber` receive everything this worker publishes
    pub fn add_subscriber(&self, subscriber: Arc<Queue>) -> bool {
        self.destinations.subscribe(subscriber)
    }

    /// Arm the first transmit relative to `start`
    pub fn schedule_first_tx(&mut self, start: Instant) {
        self.next_tx = self
            .settings
            .schedule
            .first_after(start, self.settings.initial_delay);
    }

    pub(crate) fn reschedule_tx(&mut self, now: Instant) {
        self.next_tx = self.settings.schedule.next_after(now);
    }

    pub(crate) fn tx_due(&self, now: Instant) -> bool {
        self.next_tx.is_some_and(|at| now >= at)
    }
}
