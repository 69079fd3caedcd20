//! Worker threads and node assembly
//!
//! A worker is one OS thread running the generic message loop over its own
//! queue. The node wires workers together through fanout subscriptions and
//! releases them all at once through the startup rendezvous.

pub mod behaviour;
pub mod context;
pub mod error;
pub mod message_loop;
pub mod node;
pub mod registry;
pub mod schedule;
pub mod stats;

pub use behaviour::{
    CanFrame, DemoBehaviour, DemoMessage, FrameSource, FrameStats, FrameTally, WorkerBehaviour,
};
pub use context::{LoopSettings, WorkerContext, DEFAULT_INITIAL_DELAY, DEFAULT_WAIT_TIMEOUT};
pub use error::{WorkerError, WorkerResult};
pub use message_loop::{run, run_once, LoopOutcome, LoopPhase};
pub use node::{Node, NodeBuilder, WorkerReport};
pub use registry::WorkerRegistry;
pub use schedule::TxSchedule;
pub use stats::{StatsSnapshot, WorkerStats};

#[cfg(test)]
mod tests;
