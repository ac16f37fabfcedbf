//! airtrack-core: pure decode library for the tracker air interface.
//!
//! Framing checks, tokenizing, message dispatch, and field extraction
//! only — no sockets, no async. The UDP receive loop and the MQTT
//! publish transport live in `airtrack-relay`.

pub mod config;
pub mod decode;
pub mod frame;
pub mod registry;
pub mod types;

// Re-export commonly used types at crate root
pub use decode::{dispatch, relay_datagram};
pub use frame::{validate_framing, TokenizedMessage};
pub use registry::DeviceRegistry;
pub use types::*;
