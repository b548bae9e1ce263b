//! Value objects of the relay domain.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use super::error::ValueObjectError;

/// Maximum size of a message body in bytes
pub const MAX_BODY_BYTES: usize = 16 * 1024;

/// Identity of one accepted connection.
///
/// Ids are handed out in accept order, so ordering by id is ordering by
/// connection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Allocates monotonically increasing connection ids
#[derive(Debug)]
pub struct ConnectionIdFactory {
    next: AtomicU64,
}

impl ConnectionIdFactory {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn generate(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionIdFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque text payload of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody(String);

impl MessageBody {
    /// Create a body, rejecting payloads over [`MAX_BODY_BYTES`]
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.len() > MAX_BODY_BYTES {
            return Err(ValueObjectError::BodyTooLong {
                len: value.len(),
                max: MAX_BODY_BYTES,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageBody {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Unix timestamp in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}
