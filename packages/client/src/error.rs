//! Error types for the relay client.

use std::io;

use hiroba_server::infrastructure::dto::wire::WireError;
use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server could not be reached
    #[error("Could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// An established connection ended
    #[error("Connection lost: {0}")]
    ConnectionLost(#[from] WireError),

    /// The server closed the connection at a frame boundary
    #[error("Connection closed by server")]
    ClosedByServer,

    /// Every reconnect attempt failed
    #[error("Failed to reconnect after {0} attempts")]
    ReconnectExhausted(u32),
}
