//! Element Types for the Message Bus
//!
//! Producers hand an [`Outgoing`] payload to a queue or a fanout; consumers
//! receive an owned [`Element`]. The ownership mode of a payload and the
//! state of the queue it came from are kept as two separate enums.

use std::borrow::Cow;

/// How a payload's storage relates to the queue it is pushed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ownership {
    /// The queue copies the payload on push; the producer keeps its buffer
    #[default]
    CopyOnPublish,
    /// The producer's allocation moves into the queue and on to the popper.
    /// Only valid for a single destination.
    FreeOnPop,
}

/// Queue condition observed by the consumer at the moment of a pop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueState {
    #[default]
    Clear,
    /// At least one push was dropped since the previous successful pop
    Overrun,
}

/// A payload on its way into one or more queues
#[derive(Debug, Clone)]
pub struct Outgoing<'a> {
    payload: Cow<'a, [u8]>,
    ownership: Ownership,
}

impl<'a> Outgoing<'a> {
    /// Borrow the caller's buffer; every destination queue takes its own copy
    pub fn copy(payload: &'a [u8]) -> Self {
        Self {
            payload: Cow::Borrowed(payload),
            ownership: Ownership::CopyOnPublish,
        }
    }

    /// Length of the payload in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Reborrow as a copy-on-publish payload, used once per fanout destination
    pub(crate) fn as_copy(&self) -> Outgoing<'_> {
        Outgoing::copy(&self.payload)
    }

    pub(crate) fn into_parts(self) -> (Cow<'a, [u8]>, Ownership) {
        (self.payload, self.ownership)
    }
}

impl Outgoing<'static> {
    /// Copy-on-publish payload backed by a buffer the message owns
    pub fn from_vec(payload: Vec<u8>) -> Self {
        Self {
            payload: Cow::Owned(payload),
            ownership: Ownership::CopyOnPublish,
        }
    }

    /// Hand the allocation itself to the consumer that pops it
    pub fn transfer(payload: Vec<u8>) -> Self {
        Self {
            payload: Cow::Owned(payload),
            ownership: Ownership::FreeOnPop,
        }
    }
}

/// A message popped from a queue, owned by the consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    payload: Vec<u8>,
    ownership: Ownership,
    queue_state: QueueState,
}

impl Element {
    pub(crate) fn new(payload: Vec<u8>, ownership: Ownership) -> Self {
        Self {
            payload,
            ownership,
            queue_state: QueueState::Clear,
        }
    }

    pub(crate) fn with_queue_state(mut self, queue_state: QueueState) -> Self {
        self.queue_state = queue_state;
        self
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn queue_state(&self) -> QueueState {
        self.queue_state
    }

    /// True when data was lost on the queue between the previous pop and this one
    pub fn had_overrun(&self) -> bool {
        self.queue_state == QueueState::Overrun
    }

    /// Release the payload buffer to the caller
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}
