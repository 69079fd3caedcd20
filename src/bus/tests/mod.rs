//! Test modules for the message bus
//!
//! Tests are organized by functional area.

mod publisher;
