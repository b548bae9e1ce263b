//! Domain entities.

use std::net::SocketAddr;

use super::{
    error::StampError,
    value_object::{ConnectionId, MessageBody, Timestamp},
};

/// A message relayed between clients
///
/// `server_timestamp` starts unset and may be stamped exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: ConnectionId,
    pub body: MessageBody,
    pub client_timestamp: Timestamp,
    server_timestamp: Option<Timestamp>,
}

impl Message {
    /// Create a freshly received, unstamped message
    pub fn new(sender: ConnectionId, body: MessageBody, client_timestamp: Timestamp) -> Self {
        Self {
            sender,
            body,
            client_timestamp,
            server_timestamp: None,
        }
    }

    /// Set the server receipt time.
    ///
    /// # Errors
    ///
    /// Returns [`StampError::AlreadyStamped`] if the message already has one;
    /// the existing timestamp is kept.
    pub fn stamp(&mut self, at: Timestamp) -> Result<(), StampError> {
        if let Some(existing) = self.server_timestamp {
            return Err(StampError::AlreadyStamped(existing.value()));
        }
        self.server_timestamp = Some(at);
        Ok(())
    }

    pub fn server_timestamp(&self) -> Option<Timestamp> {
        self.server_timestamp
    }

    pub fn is_stamped(&self) -> bool {
        self.server_timestamp.is_some()
    }
}

/// Read-only view of a registered connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedClient {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    pub connected_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_message() -> Message {
        Message::new(
            ConnectionId::new(1),
            MessageBody::new("hi".to_string()).unwrap(),
            Timestamp::new(1000),
        )
    }

    #[test]
    fn test_new_message_is_unstamped() {
        // テスト項目: 受信直後のメッセージはサーバータイムスタンプを持たない
        // given (前提条件):

        // when (操作):
        let message = create_test_message();

        // then (期待する結果):
        assert!(!message.is_stamped());
        assert_eq!(message.server_timestamp(), None);
    }

    #[test]
    fn test_stamp_sets_server_timestamp() {
        // テスト項目: stamp でサーバータイムスタンプが設定される
        // given (前提条件):
        let mut message = create_test_message();

        // when (操作):
        let result = message.stamp(Timestamp::new(2000));

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(message.server_timestamp(), Some(Timestamp::new(2000)));
    }

    #[test]
    fn test_second_stamp_is_rejected() {
        // テスト項目: 2 回目の stamp はエラーになり、最初の値が保持される
        // given (前提条件):
        let mut message = create_test_message();
        message.stamp(Timestamp::new(2000)).unwrap();

        // when (操作):
        let result = message.stamp(Timestamp::new(3000));

        // then (期待する結果):
        assert_eq!(result, Err(StampError::AlreadyStamped(2000)));
        assert_eq!(message.server_timestamp(), Some(Timestamp::new(2000)));
    }
}
