//! Infrastructure layer
//!
//! - `dto`: wire frames and HTTP DTOs
//! - `registry`: the live-connection registry
//! - `message_log`: `MessageLog` implementations
//! - `outbound`: per-connection writer tasks

pub mod dto;
pub mod message_log;
pub mod outbound;
pub mod registry;

pub use message_log::InMemoryMessageLog;
pub use registry::{ClientHandle, ClientRegistry, DeliveryOutcome};
