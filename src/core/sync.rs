//! Synchronization utilities for robust mutex handling
//!
//! This module provides utilities for handling mutex poisoning and lock
//! contention in a consistent manner across the codebase.

use std::sync::{LockResult, TryLockError, TryLockResult};

/// Handle poisoned mutex cases with consistent error handling
///
/// Converts a poison error into an application-specific error using the
/// provided constructor. Works for plain guards as well as the
/// `(guard, timeout)` pairs returned by condition variable waits.
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use telebus::bus::BusError;
/// use telebus::core::sync::handle_mutex_poison;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(mutex.lock(), |message| BusError::Poisoned { message }).unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<T, E>(
    result: LockResult<T>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (mutex poisoned). This indicates a panic occurred while holding a lock. PoisonError: {:?}",
            poison_err
        ))
    })
}

/// Handle a `try_lock` attempt, separating contention from poisoning
///
/// Contention maps to the error built by `would_block`; a poisoned lock maps
/// to the error built by `error_constructor`.
pub fn handle_try_lock<T, E>(
    result: TryLockResult<T>,
    would_block: impl FnOnce() -> E,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    match result {
        Ok(guard) => Ok(guard),
        Err(TryLockError::WouldBlock) => Err(would_block()),
        Err(TryLockError::Poisoned(poison_err)) => Err(error_constructor(format!(
            "Internal synchronisation error (mutex poisoned). This indicates a panic occurred while holding a lock. PoisonError: {:?}",
            poison_err
        ))),
    }
}
