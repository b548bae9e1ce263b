//! UseCase layer
//!
//! Orchestrates the registry, the message log and the clock. Socket handling
//! lives in the `ui` layer.

mod broadcast_message;
mod connect_client;
mod disconnect_client;
mod error;
mod query;

pub use broadcast_message::{BroadcastMessageUseCase, BroadcastReport};
pub use connect_client::{ClientConnection, ConnectClientUseCase};
pub use disconnect_client::DisconnectClientUseCase;
pub use error::{BroadcastError, ConnectError};
pub use query::ServerQueryUseCase;
