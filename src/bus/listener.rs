//! Wake-up handles and per-queue listener registry
//!
//! Every worker owns one [`WakeHandle`]. Registering it on a queue means each
//! successful push to that queue wakes the worker's timed wait. The handle
//! latches a pending flag under its own mutex, so a notification that lands
//! while the worker is busy draining is not lost.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Result of a timed wait on a [`WakeHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Notified,
    TimedOut,
}

#[derive(Debug, Default)]
struct WakeSignal {
    pending: Mutex<bool>,
    cond: Condvar,
    notified: AtomicU64,
}

/// Shareable wake-up condition belonging to one worker
#[derive(Debug, Clone, Default)]
pub struct WakeHandle {
    signal: Arc<WakeSignal>,
}

impl WakeHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark data as pending and wake every thread waiting on this handle
    pub fn notify(&self) {
        {
            let mut pending = self
                .signal
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *pending = true;
        }
        self.signal.notified.fetch_add(1, Ordering::Relaxed);
        self.signal.cond.notify_all();
    }

    /// Total notifications delivered to this handle since creation
    pub fn notifications(&self) -> u64 {
        self.signal.notified.load(Ordering::Relaxed)
    }

    /// Block until notified or until `deadline` passes.
    ///
    /// Spurious wakeups go back to sleep against the same absolute deadline.
    /// A pending notification is consumed by the call that observes it.
    pub fn wait_until(&self, deadline: Instant) -> WaitOutcome {
        let mut pending = self
            .signal
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        loop {
            if *pending {
                *pending = false;
                return WaitOutcome::Notified;
            }

            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::TimedOut;
            }

            let (guard, _) = self
                .signal
                .cond
                .wait_timeout(pending, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            pending = guard;
        }
    }

    /// Convenience wrapper computing the deadline from now
    pub fn wait_timeout(&self, timeout: Duration) -> WaitOutcome {
        self.wait_until(Instant::now() + timeout)
    }

    /// Whether a notification is waiting to be consumed
    pub fn is_pending(&self) -> bool {
        *self
            .signal
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Identity comparison: two handles are the same listener when they share a signal
    pub fn same_as(&self, other: &WakeHandle) -> bool {
        Arc::ptr_eq(&self.signal, &other.signal)
    }
}

/// Listener registry owned by a queue, guarded separately from the queue state
#[derive(Debug, Default)]
pub(crate) struct ListenerSet {
    handles: Mutex<Vec<WakeHandle>>,
}

impl ListenerSet {
    /// Register a handle. Returns false when it was already registered.
    pub(crate) fn add(&self, handle: &WakeHandle) -> bool {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        if handles.iter().any(|existing| existing.same_as(handle)) {
            return false;
        }
        handles.push(handle.clone());
        true
    }

    pub(crate) fn notify_all(&self) {
        let handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in handles.iter() {
            handle.notify();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_wait_times_out_without_notification() {
        let handle = WakeHandle::new();
        let started = Instant::now();

        let outcome = handle.wait_timeout(Duration::from_millis(20));

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_notification_before_wait_is_latched() {
        let handle = WakeHandle::new();
        handle.notify();
        assert!(handle.is_pending());

        assert_eq!(
            handle.wait_timeout(Duration::from_secs(5)),
            WaitOutcome::Notified
        );
        // Consumed by the first wait
        assert!(!handle.is_pending());
        assert_eq!(
            handle.wait_timeout(Duration::from_millis(5)),
            WaitOutcome::TimedOut
        );
    }

    #[test]
    fn test_notify_wakes_waiting_thread() {
        let handle = WakeHandle::new();
        let waiter = handle.clone();

        let join = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(20));
        handle.notify();

        assert_eq!(join.join().unwrap(), WaitOutcome::Notified);
    }

    #[test]
    fn test_listener_set_is_idempotent() {
        let set = ListenerSet::default();
        let a = WakeHandle::new();
        let b = WakeHandle::new();

        assert!(set.add(&a));
        assert!(!set.add(&a));
        assert!(!set.add(&a.clone()));
        assert!(set.add(&b));
        assert_eq!(set.len(), 2);
    }
}
