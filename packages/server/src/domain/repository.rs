//! Repository trait definitions
//!
//! The use case layer depends on these traits only; the infrastructure layer
//! provides the implementations.

use async_trait::async_trait;

use super::Message;

/// Append-only history of every broadcast message
///
/// Callers record each message exactly once; `snapshot` hands out an owned
/// copy so server-held history cannot be mutated from outside.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Append one message.
    ///
    /// Broadcasts wait for this call one at a time, so a slow log slows the
    /// relay's message throughput (connection bookkeeping is not affected).
    async fn record(&self, message: Message);

    /// Point-in-time copy of the whole history, in insertion order
    async fn snapshot(&self) -> Vec<Message>;

    /// Number of recorded messages
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
