//! Hiroba relay server library.
//!
//! A TCP message relay: every message a client sends is stamped with the
//! server time once and broadcast to all connected clients.

// layers
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub use config::{BroadcastPolicy, ConfigError, ServerConfig, SlowClientPolicy};
pub use ui::{RelayServer, ServerError, ServerHandle};
