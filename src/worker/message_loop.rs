//! Generic per-thread worker loop
//!
//! Each iteration moves through three phases:
//!
//! ```text
//!   Waiting ──► Draining ──► MaybeTransmitting ──► Waiting ...
//! ```
//!
//! *Waiting* blocks on the worker's wake handle for at most the configured
//! timeout, measured against an absolute deadline. *Draining* pops the
//! worker's queue until it is empty. *MaybeTransmitting* asks the behaviour
//! for a message once the transmit time has come and fans it out.
//!
//! The wake handle's mutex is only held inside the wait itself, so producers
//! notifying this worker never block behind a drain.

use crate::bus::{BusError, WaitOutcome};
use crate::core::shutdown::StopSignal;
use crate::core::time::TimeProvider;
use crate::worker::behaviour::WorkerBehaviour;
use crate::worker::context::WorkerContext;
use std::time::Instant;

/// Attempts a drain makes on a contended non-blocking queue before giving
/// up until the next iteration
const CONTENDED_POP_RETRIES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Waiting,
    Draining,
    MaybeTransmitting,
}

/// What one iteration of the loop did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOutcome {
    pub woke: WaitOutcome,
    /// Elements popped during the drain
    pub received: usize,
    pub transmitted: bool,
    /// The transmit reached some destinations but not all
    pub partial_publish: bool,
}

impl LoopOutcome {
    pub fn did_something(&self) -> bool {
        self.received > 0 || self.transmitted
    }
}

/// Run a single wait / drain / transmit cycle
pub fn run_once<T: TimeProvider>(
    ctx: &mut WorkerContext,
    behaviour: &mut dyn WorkerBehaviour,
    clock: &T,
) -> LoopOutcome {
    let mut phase = LoopPhase::Waiting;
    log::trace!("[{:<5}] {:?}", ctx.name(), phase);
    let deadline = Instant::now() + ctx.settings().wait_timeout;
    let woke = ctx.wake().wait_until(deadline);

    phase = LoopPhase::Draining;
    log::trace!("[{:<5}] {:?} after {:?}", ctx.name(), phase, woke);
    let received = drain(ctx, behaviour);

    phase = LoopPhase::MaybeTransmitting;
    log::trace!("[{:<5}] {:?}", ctx.name(), phase);
    let (transmitted, partial_publish) = maybe_transmit(ctx, behaviour, clock);

    LoopOutcome {
        woke,
        received,
        transmitted,
        partial_publish,
    }
}

/// Loop until `stop` is requested
pub fn run<T: TimeProvider>(
    ctx: &mut WorkerContext,
    behaviour: &mut dyn WorkerBehaviour,
    clock: &T,
    stop: &StopSignal,
) {
    log::debug!("[{:<5}] message loop started", ctx.name());

    while !stop.is_stop_requested() {
        let outcome = run_once(ctx, behaviour, clock);
        if outcome.did_something() {
            let stats = ctx.stats().snapshot();
            log::debug!(
                "[{:<5}]         (tx {} rx {})",
                ctx.name(),
                stats.num_tx,
                stats.num_rx
            );
        }
    }

    log::debug!("[{:<5}] message loop stopped", ctx.name());
}

fn drain(ctx: &WorkerContext, behaviour: &mut dyn WorkerBehaviour) -> usize {
    let mut received = 0;
    let mut contended = 0;

    loop {
        match ctx.queue().pop() {
            Ok(Some(element)) => {
                let had_overrun = element.had_overrun();
                if had_overrun {
                    log::warn!(
                        "[{:<5}] queue overrun: messages were dropped before this one",
                        ctx.name()
                    );
                }
                behaviour.on_message(ctx.name(), element);
                ctx.stats().record_rx(had_overrun);
                received += 1;
            }
            Ok(None) => break,
            Err(BusError::WouldBlock { .. }) if contended < CONTENDED_POP_RETRIES => {
                contended += 1;
                std::thread::yield_now();
            }
            Err(e) => {
                if e.is_retryable() {
                    log::trace!("[{:<5}] pop deferred: {}", ctx.name(), e);
                } else {
                    log::error!("[{:<5}] pop failed: {}", ctx.name(), e);
                }
                break;
            }
        }
    }

    received
}

fn maybe_transmit<T: TimeProvider>(
    ctx: &mut WorkerContext,
    behaviour: &mut dyn WorkerBehaviour,
    clock: &T,
) -> (bool, bool) {
    let now = clock.now();
    if !ctx.tx_due(now) {
        return (false, false);
    }

    let count = ctx.stats().count();
    let mut transmitted = false;
    let mut partial = false;

    if let Some(message) = behaviour.produce(ctx.name(), count, clock) {
        log::debug!("[{:<5}] tx #{:03}", ctx.name(), count);
        let report = ctx.destinations().publish_with_report(message);
        partial = report.is_partial();

        for (queue, error) in &report.failed {
            if error.is_data_loss() {
                log::warn!("[{:<5}] publish to '{}' lost: {}", ctx.name(), queue, error);
            } else if matches!(error, BusError::Closed { .. }) {
                log::debug!("[{:<5}] publish to '{}' dropped: {}", ctx.name(), queue, error);
            } else if error.is_retryable() {
                log::trace!("[{:<5}] publish to '{}' skipped: {}", ctx.name(), queue, error);
            } else {
                log::error!("[{:<5}] publish to '{}' failed: {}", ctx.name(), queue, error);
            }
        }

        ctx.stats().record_tx(!report.is_complete());
        transmitted = true;
    }

    ctx.reschedule_tx(now);
    (transmitted, partial)
}
