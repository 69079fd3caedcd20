//! Inter-thread publish/subscribe bus for a telemetry node
//!
//! Worker threads exchange messages through bounded per-worker queues. See
//! [`bus`] for the queue engine and fanout, and [`worker`] for the message
//! loop and node assembly.

pub mod app;
pub mod bus;
pub mod core;
pub mod worker;
