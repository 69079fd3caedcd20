//! Public API for the message bus
//!
//! External modules should import from here rather than directly from the
//! internal modules. See the module documentation for the overall design.

// Queue engine
pub use crate::bus::queue::{Queue, QueueOptions, QueueStats};

// Elements and ownership
pub use crate::bus::element::{Element, Outgoing, Ownership, QueueState};

// Wake-ups
pub use crate::bus::listener::{WaitOutcome, WakeHandle};

// Fanout
pub use crate::bus::publisher::{publish, publish_with_report, Destinations, PublishReport};

// Startup rendezvous
pub use crate::bus::barrier::Rendezvous;

// Typed payloads
pub use crate::bus::typed::{TypedConsumer, TypedElement};

// Error handling
pub use crate::bus::error::{BusError, BusResult};
