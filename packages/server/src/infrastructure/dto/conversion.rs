//! Conversion logic between DTOs and domain entities.

use hiroba_shared::time::timestamp_to_rfc3339;

use crate::domain::{ConnectedClient, ConnectionId, Message, MessageBody, Timestamp};
use crate::infrastructure::dto::{
    http as http_dto,
    wire::{self, DecodeError, MessageFrame},
};

// ========================================
// DTO → Domain Entity
// ========================================

/// Turn an inbound frame into an unstamped domain message.
///
/// Any `server_timestamp` or `sender` claimed by the client is discarded; the
/// server alone assigns both.
pub fn frame_to_message(sender: ConnectionId, frame: MessageFrame) -> Result<Message, DecodeError> {
    let body = MessageBody::new(frame.body)?;
    Ok(Message::new(
        sender,
        body,
        Timestamp::new(frame.client_timestamp),
    ))
}

// ========================================
// Domain Entity → DTO
// ========================================

impl From<&Message> for MessageFrame {
    fn from(model: &Message) -> Self {
        Self {
            version: wire::PROTOCOL_VERSION,
            body: model.body.as_str().to_string(),
            client_timestamp: model.client_timestamp.value(),
            server_timestamp: model.server_timestamp().map(|ts| ts.value()),
            sender: Some(model.sender.value()),
        }
    }
}

impl From<Message> for http_dto::MessageDto {
    fn from(model: Message) -> Self {
        let server_timestamp = model.server_timestamp().map(|ts| ts.value());
        Self {
            sender: model.sender.value(),
            body: model.body.into_string(),
            client_timestamp: model.client_timestamp.value(),
            server_timestamp,
        }
    }
}

impl From<ConnectedClient> for http_dto::ClientDto {
    fn from(model: ConnectedClient) -> Self {
        Self {
            connection_id: model.id.value(),
            peer_addr: model.peer_addr.to_string(),
            connected_at: timestamp_to_rfc3339(model.connected_at.value()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MAX_BODY_BYTES, ValueObjectError};

    #[test]
    fn test_frame_to_message_discards_server_fields() {
        // テスト項目: クライアントが送ったサーバータイムスタンプと送信者は無視される
        // given (前提条件):
        let frame = MessageFrame {
            version: 1,
            body: "hi".to_string(),
            client_timestamp: 1000,
            server_timestamp: Some(42),
            sender: Some(99),
        };

        // when (操作):
        let message = frame_to_message(ConnectionId::new(7), frame).unwrap();

        // then (期待する結果):
        assert_eq!(message.sender, ConnectionId::new(7));
        assert_eq!(message.body.as_str(), "hi");
        assert_eq!(message.client_timestamp, Timestamp::new(1000));
        assert!(!message.is_stamped());
    }

    #[test]
    fn test_frame_to_message_rejects_oversized_body() {
        // テスト項目: 本文が上限を超えるフレームは InvalidMessage になる
        // given (前提条件):
        let frame = MessageFrame::outgoing("x".repeat(MAX_BODY_BYTES + 1), 1);

        // when (操作):
        let result = frame_to_message(ConnectionId::new(1), frame);

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(DecodeError::InvalidMessage(
                ValueObjectError::BodyTooLong { .. }
            ))
        ));
    }

    #[test]
    fn test_stamped_message_to_frame() {
        // テスト項目: スタンプ済みメッセージが送信者付きのフレームに変換される
        // given (前提条件):
        let mut message = Message::new(
            ConnectionId::new(3),
            MessageBody::new("hello".to_string()).unwrap(),
            Timestamp::new(1000),
        );
        message.stamp(Timestamp::new(2000)).unwrap();

        // when (操作):
        let frame = MessageFrame::from(&message);

        // then (期待する結果):
        assert_eq!(frame.version, wire::PROTOCOL_VERSION);
        assert_eq!(frame.body, "hello");
        assert_eq!(frame.client_timestamp, 1000);
        assert_eq!(frame.server_timestamp, Some(2000));
        assert_eq!(frame.sender, Some(3));
    }

    #[test]
    fn test_domain_client_to_dto() {
        // テスト項目: ConnectedClient が RFC 3339 の接続時刻を持つ DTO に変換される
        // given (前提条件):
        let client = ConnectedClient {
            id: ConnectionId::new(5),
            peer_addr: "127.0.0.1:5555".parse().unwrap(),
            connected_at: Timestamp::new(1672531200000),
        };

        // when (操作):
        let dto: http_dto::ClientDto = client.into();

        // then (期待する結果):
        assert_eq!(dto.connection_id, 5);
        assert_eq!(dto.peer_addr, "127.0.0.1:5555");
        assert_eq!(dto.connected_at, "2023-01-01T00:00:00.000Z");
    }
}
