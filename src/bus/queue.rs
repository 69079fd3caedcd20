//! Bounded FIFO queue with listener wake-ups and overrun accounting
//!
//! Each queue is owned by one worker but may be pushed to by any number of
//! producers. The element storage is a `VecDeque` sized to the capacity up
//! front, protected by a single mutex. Listeners live behind a second mutex
//! that is only taken after the state lock has been released.

use crate::bus::element::{Element, Outgoing, Ownership, QueueState};
use crate::bus::error::{BusError, BusResult};
use crate::bus::listener::{ListenerSet, WakeHandle};
use crate::core::sync::{handle_mutex_poison, handle_try_lock};
use std::collections::{TryReserveError, VecDeque};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Lock acquisition policy for a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueOptions {
    /// Every push/pop uses a try-lock and fails fast instead of sleeping,
    /// and a full queue rejects pushes rather than waiting for space
    pub non_blocking: bool,
}

impl QueueOptions {
    pub fn blocking() -> Self {
        Self {
            non_blocking: false,
        }
    }

    pub fn non_blocking() -> Self {
        Self { non_blocking: true }
    }
}

/// Counters and occupancy of a queue, read under its lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    /// Elements accepted by push
    pub pushed: u64,
    /// Elements handed out by pop
    pub popped: u64,
    /// Pushes rejected with data loss (full or allocation failure)
    pub dropped: u64,
    /// Current number of queued elements
    pub len: usize,
    pub capacity: usize,
}

#[derive(Debug)]
struct QueueInner {
    elements: VecDeque<Element>,
    full: bool,
    overrun: bool,
    closed: bool,
    pushed: u64,
    popped: u64,
    dropped: u64,
}

/// A named, bounded, multi-producer queue of [`Element`]s
#[derive(Debug)]
pub struct Queue {
    name: String,
    capacity: usize,
    options: QueueOptions,
    inner: Mutex<QueueInner>,
    not_full: Condvar,
    listeners: ListenerSet,
}

impl Queue {
    /// Create a queue holding at most `capacity` elements
    pub fn new(name: impl Into<String>, capacity: usize, options: QueueOptions) -> BusResult<Self> {
        let name = name.into();
        if capacity == 0 {
            return Err(BusError::InvalidCapacity { queue: name });
        }

        Ok(Self {
            name,
            capacity,
            options,
            inner: Mutex::new(QueueInner {
                elements: VecDeque::with_capacity(capacity),
                full: false,
                overrun: false,
                closed: false,
                pushed: 0,
                popped: 0,
                dropped: 0,
            }),
            not_full: Condvar::new(),
            listeners: ListenerSet::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn options(&self) -> QueueOptions {
        self.options
    }

    /// Append a payload at the tail, then wake every registered listener.
    ///
    /// A blocking queue waits for space when full. A non-blocking queue
    /// returns [`BusError::WouldBlock`] if its lock is contended and
    /// [`BusError::Full`] (setting the overrun indicator) if it has no room.
    /// Once the queue is closed every push, including one already waiting
    /// for space, returns [`BusError::Closed`].
    pub fn push(&self, message: Outgoing<'_>) -> BusResult<()> {
        self.push_with(message, copy_payload)
    }

    fn push_with(
        &self,
        message: Outgoing<'_>,
        copy: impl FnOnce(&[u8]) -> Result<Vec<u8>, TryReserveError>,
    ) -> BusResult<()> {
        let mut inner = self.acquire()?;

        loop {
            if inner.closed {
                return Err(BusError::Closed {
                    queue: self.name.clone(),
                });
            }
            if inner.elements.len() < self.capacity {
                break;
            }
            if self.options.non_blocking {
                inner.overrun = true;
                inner.dropped += 1;
                return Err(BusError::Full {
                    queue: self.name.clone(),
                    capacity: self.capacity,
                });
            }
            inner = handle_mutex_poison(self.not_full.wait(inner), |message| {
                BusError::Poisoned { message }
            })?;
        }

        let (payload, ownership) = message.into_parts();
        let payload = match ownership {
            Ownership::CopyOnPublish => match copy(&payload) {
                Ok(owned) => owned,
                Err(_) => {
                    inner.overrun = true;
                    inner.dropped += 1;
                    return Err(BusError::NoMemory {
                        queue: self.name.clone(),
                        requested: payload.len(),
                    });
                }
            },
            Ownership::FreeOnPop => payload.into_owned(),
        };

        inner.elements.push_back(Element::new(payload, ownership));
        inner.pushed += 1;
        if inner.elements.len() >= self.capacity {
            inner.full = true;
        }
        drop(inner);

        self.listeners.notify_all();
        Ok(())
    }

    /// Remove the head element, or `Ok(None)` when the queue is empty.
    ///
    /// A successful pop clears the full and overrun indicators; the returned
    /// element reports whether an overrun had been recorded.
    pub fn pop(&self) -> BusResult<Option<Element>> {
        let mut inner = self.acquire()?;

        let Some(element) = inner.elements.pop_front() else {
            return Ok(None);
        };

        let queue_state = if inner.overrun {
            QueueState::Overrun
        } else {
            QueueState::Clear
        };
        inner.overrun = false;
        inner.full = false;
        inner.popped += 1;
        drop(inner);

        self.not_full.notify_one();
        Ok(Some(element.with_queue_state(queue_state)))
    }

    /// Refuse further pushes and release producers blocked waiting for space.
    ///
    /// Queued elements stay poppable. Closing twice has no further effect.
    pub fn close(&self) {
        let mut inner = self.inspect();
        if inner.closed {
            return;
        }
        inner.closed = true;
        drop(inner);

        log::debug!("queue '{}' closed", self.name);
        self.not_full.notify_all();
        self.listeners.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inspect().closed
    }

    /// Register a wake-up handle. Returns false if it was already registered.
    pub fn add_listener(&self, handle: &WakeHandle) -> bool {
        self.listeners.add(handle)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn len(&self) -> usize {
        self.inspect().elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while the last push filled the queue and no pop has happened since
    pub fn is_full(&self) -> bool {
        self.inspect().full
    }

    /// True while a dropped push has not yet been followed by a pop
    pub fn is_overrun(&self) -> bool {
        self.inspect().overrun
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.inspect();
        QueueStats {
            pushed: inner.pushed,
            popped: inner.popped,
            dropped: inner.dropped,
            len: inner.elements.len(),
            capacity: self.capacity,
        }
    }

    fn acquire(&self) -> BusResult<MutexGuard<'_, QueueInner>> {
        if self.options.non_blocking {
            handle_try_lock(
                self.inner.try_lock(),
                || BusError::WouldBlock {
                    queue: self.name.clone(),
                },
                |message| BusError::Poisoned { message },
            )
        } else {
            handle_mutex_poison(self.inner.lock(), |message| BusError::Poisoned {
                message,
            })
        }
    }

    // Always blocks and tolerates poisoning; used for snapshots and close
    fn inspect(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn copy_payload(payload: &[u8]) -> Result<Vec<u8>, TryReserveError> {
    let mut copy = Vec::new();
    copy.try_reserve_exact(payload.len())?;
    copy.extend_from_slice(payload);
    Ok(copy)
}
