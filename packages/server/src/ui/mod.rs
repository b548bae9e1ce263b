//! Relay server: acceptor, connection handlers and the admin HTTP endpoint.

mod acceptor;
mod error;
mod handler;
mod pool;
mod server;
pub mod signal;
pub mod state;

pub use error::{AcceptError, ServerError};
pub use pool::{PoolError, WorkerPool};
pub use server::{RelayServer, ServerHandle};
