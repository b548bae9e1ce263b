//! UseCase errors.

use thiserror::Error;

use crate::domain::{ConnectionId, StampError};

/// Broadcast failures. Per-target delivery problems are not errors; they are
/// counted in the report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastError {
    #[error("cannot stamp message: {0}")]
    Stamp(#[from] StampError),
}

/// Registration failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),
}
