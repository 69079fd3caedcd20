//! Transmit scheduling for producing workers

use crate::core::time::jitter;
use std::time::{Duration, Instant};

/// Default upper bound of the random gap between two transmits
pub const DEFAULT_JITTER_MAX: Duration = Duration::from_millis(2500);

/// Extra random spread added to the first jittered transmit so that workers
/// started together do not all fire at once
pub const INITIAL_SPREAD: Duration = Duration::from_millis(1000);

/// When a worker produces its next message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxSchedule {
    /// Next transmit at now plus a uniform random delay in `1..=max` ms
    Jittered { max: Duration },
    /// Fixed cadence, for heartbeat-style producers
    Fixed { interval: Duration },
    /// Pure consumer
    Never,
}

impl Default for TxSchedule {
    fn default() -> Self {
        TxSchedule::Jittered {
            max: DEFAULT_JITTER_MAX,
        }
    }
}

impl TxSchedule {
    /// First transmit time for a worker that starts at `start`
    pub fn first_after(&self, start: Instant, initial_delay: Duration) -> Option<Instant> {
        match self {
            TxSchedule::Jittered { .. } => Some(start + initial_delay + jitter(INITIAL_SPREAD)),
            TxSchedule::Fixed { .. } => Some(start + initial_delay),
            TxSchedule::Never => None,
        }
    }

    /// Transmit time following a transmit made at `now`
    pub fn next_after(&self, now: Instant) -> Option<Instant> {
        match self {
            TxSchedule::Jittered { max } => Some(now + jitter(*max)),
            TxSchedule::Fixed { interval } => Some(now + *interval),
            TxSchedule::Never => None,
        }
    }

    pub fn produces(&self) -> bool {
        !matches!(self, TxSchedule::Never)
    }
}
