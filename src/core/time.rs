//! Time provider abstraction and transmit-jitter helpers

#[cfg(test)]
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Abstraction over system time for testable time-dependent logic
pub trait TimeProvider: Send + Sync {
    /// Get the current monotonic time (for scheduling)
    fn now(&self) -> Instant;

    /// Get the current system time (for timestamps)
    fn system_time(&self) -> SystemTime;
}

/// Production time provider using actual system time
#[derive(Debug, Default, Clone)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Uniform random delay in `1..=max` whole milliseconds.
///
/// Returns zero when `max` is below one millisecond.
pub fn jitter(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(fastrand::u64(1..=max_ms))
}

/// Microseconds since the Unix epoch, saturating at zero for earlier times
pub fn epoch_micros(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Mock time provider for deterministic testing
#[derive(Clone)]
#[cfg(test)]
pub struct MockTimeProvider {
    current_instant: Arc<Mutex<Instant>>,
    current_system_time: Arc<Mutex<SystemTime>>,
}

#[cfg(test)]
impl MockTimeProvider {
    pub fn new() -> Self {
        Self {
            current_instant: Arc::new(Mutex::new(Instant::now())),
            current_system_time: Arc::new(Mutex::new(SystemTime::now())),
        }
    }

    /// Advance both monotonic and system time by the given duration
    pub fn advance_time(&self, duration: Duration) {
        {
            let mut instant = self.current_instant.lock().unwrap();
            *instant += duration;
        }
        {
            let mut system_time = self.current_system_time.lock().unwrap();
            *system_time += duration;
        }
    }

    /// Set the current system time (for timestamps)
    pub fn set_system_time(&self, system_time: SystemTime) {
        let mut current = self.current_system_time.lock().unwrap();
        *current = system_time;
    }
}

#[cfg(test)]
impl TimeProvider for MockTimeProvider {
    fn now(&self) -> Instant {
        *self.current_instant.lock().unwrap()
    }

    fn system_time(&self) -> SystemTime {
        *self.current_system_time.lock().unwrap()
    }
}
