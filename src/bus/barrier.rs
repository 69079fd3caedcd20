//! Rendezvous barrier used once at node startup
//!
//! Built from a mutex, a condition variable and a generation counter. The
//! generation changes every time the barrier releases, so a thread that wakes
//! spuriously can tell whether its own cycle has completed.

use crate::bus::error::{BusError, BusResult};
use crate::core::sync::handle_mutex_poison;
use std::sync::{Condvar, Mutex, PoisonError};

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    destroyed: bool,
    cancelled: bool,
}

/// Releases `participants` threads together once all of them have arrived
#[derive(Debug)]
pub struct Rendezvous {
    participants: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl Rendezvous {
    /// Create a barrier for `participants` threads; zero is rejected
    pub fn new(participants: usize) -> BusResult<Self> {
        if participants == 0 {
            return Err(BusError::InvalidParticipants);
        }

        Ok(Self {
            participants,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                destroyed: false,
                cancelled: false,
            }),
            released: Condvar::new(),
        })
    }

    pub fn participants(&self) -> usize {
        self.participants
    }

    /// Block until `participants` calls have arrived in the current cycle.
    ///
    /// Returns `Ok(true)` for exactly one thread per cycle (the one whose
    /// arrival completed it). The barrier resets for the next cycle.
    /// Returns [`BusError::BarrierDestroyed`] if the barrier was destroyed or
    /// cancelled before this cycle completed.
    pub fn wait(&self) -> BusResult<bool> {
        let mut state = self.lock()?;
        if state.destroyed || state.cancelled {
            return Err(BusError::BarrierDestroyed);
        }

        let generation = state.generation;
        state.arrived += 1;

        if state.arrived == self.participants {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            drop(state);
            self.released.notify_all();
            return Ok(true);
        }

        while state.generation == generation {
            if state.cancelled {
                state.arrived = state.arrived.saturating_sub(1);
                return Err(BusError::BarrierDestroyed);
            }
            state = handle_mutex_poison(self.released.wait(state), |message| {
                BusError::Poisoned { message }
            })?;
        }

        Ok(false)
    }

    /// Release every waiting thread with an error and refuse further waits.
    ///
    /// Used when startup fails part way so threads already at the barrier
    /// can exit instead of waiting forever.
    pub fn cancel(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.cancelled = true;
        drop(state);
        self.released.notify_all();
    }

    /// Mark the barrier unusable. Fails with [`BusError::BarrierBusy`] while
    /// threads are still waiting on it.
    pub fn destroy(&self) -> BusResult<()> {
        let mut state = self.lock()?;
        if state.arrived > 0 {
            return Err(BusError::BarrierBusy {
                waiting: state.arrived,
            });
        }
        state.destroyed = true;
        Ok(())
    }

    /// Threads currently waiting in the open cycle
    pub fn waiting(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .arrived
    }

    fn lock(&self) -> BusResult<std::sync::MutexGuard<'_, BarrierState>> {
        handle_mutex_poison(self.state.lock(), |message| BusError::Poisoned {
            message,
        })
    }
}
