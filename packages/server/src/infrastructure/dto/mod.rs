//! Data Transfer Objects (DTOs) for the relay.
//!
//! DTOs are organized by protocol:
//! - `wire`: length-prefixed JSON frames exchanged over TCP
//! - `http`: admin HTTP API response DTOs

pub mod conversion;
pub mod http;
pub mod wire;
