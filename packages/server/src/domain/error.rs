//! Domain errors.

use thiserror::Error;

/// Value object construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    /// Message body exceeds the maximum size
    #[error("message body is {len} bytes, exceeding the limit of {max} bytes")]
    BodyTooLong { len: usize, max: usize },
}

/// Errors raised when stamping the server receipt time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StampError {
    /// The message already carries a server timestamp
    #[error("message already stamped at {0}")]
    AlreadyStamped(i64),
}
