//! Inter-thread Publish/Subscribe Bus
//!
//! Bounded queues, listener wake-ups, multi-destination fanout and the
//! startup rendezvous shared by every worker thread of the node.
//!
//! # Overview
//!
//! - **Queues**: each worker owns one bounded FIFO that any thread may push to
//! - **Lock policy**: blocking queues sleep on contention and on full; non-blocking
//!   queues fail fast with `WouldBlock` or `Full`
//! - **Overrun**: a rejected push latches an indicator that the next pop reports
//!   and clears
//! - **Listeners**: every successful push wakes the subscribers' wake handles
//! - **Fanout**: `publish` pushes one payload to every destination and reports
//!   the last failure
//!
//! # Architecture
//!
//! ```text
//!   worker one                 worker two                 worker three
//!  ┌───────────┐  publish     ┌───────────┐  publish     ┌───────────┐
//!  │ produce() ├─────┬───────►│  queue    │        ┌────►│  queue    │
//!  └───────────┘     │        │  ┌─┬─┬─┐  │        │     │  ┌─┬─┬─┐  │
//!                    │        │  └─┴─┴─┘  │        │     │  └─┴─┴─┘  │
//!                    │        └─────┬─────┘        │     └─────┬─────┘
//!                    │              │ notify       │           │ notify
//!                    │              ▼              │           ▼
//!                    │        wake handle ─► loop  │     wake handle ─► loop
//!                    └─────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use telebus::bus::{Destinations, Outgoing, Queue, QueueOptions, WakeHandle};
//!
//! let inbox = Arc::new(Queue::new("two", 64, QueueOptions::default()).unwrap());
//! let wake = WakeHandle::new();
//! inbox.add_listener(&wake);
//!
//! let destinations = Destinations::new();
//! destinations.subscribe(Arc::clone(&inbox));
//! destinations.publish(Outgoing::copy(b"hello")).unwrap();
//!
//! assert!(wake.is_pending());
//! let element = inbox.pop().unwrap().unwrap();
//! assert_eq!(element.payload(), b"hello");
//! ```

pub mod api;
pub mod barrier;
pub mod element;
pub mod error;
pub mod listener;
pub mod publisher;
pub mod queue;
pub mod typed;

pub use api::*;

#[cfg(test)]
mod tests;
