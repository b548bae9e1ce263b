//! InMemory Message Log 実装
//!
//! Implements the domain `MessageLog` trait on top of a `Vec` guarded by a
//! mutex. History is never pruned and lives as long as the server.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Message, MessageLog};

/// In-memory, append-only message history
#[derive(Debug, Default)]
pub struct InMemoryMessageLog {
    messages: Mutex<Vec<Message>>,
}

impl InMemoryMessageLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageLog for InMemoryMessageLog {
    async fn record(&self, message: Message) {
        let mut messages = self.messages.lock().await;
        messages.push(message);
    }

    async fn snapshot(&self) -> Vec<Message> {
        let messages = self.messages.lock().await;
        messages.clone()
    }

    async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConnectionId, MessageBody, Timestamp};

    fn create_test_message(sender: u64, body: &str) -> Message {
        Message::new(
            ConnectionId::new(sender),
            MessageBody::new(body.to_string()).unwrap(),
            Timestamp::new(1000),
        )
    }

    #[tokio::test]
    async fn test_new_log_is_empty() {
        // テスト項目: 作成直後のログは空
        // given (前提条件):
        let log = InMemoryMessageLog::new();

        // when (操作):
        let snapshot = log.snapshot().await;

        // then (期待する結果):
        assert!(snapshot.is_empty());
        assert!(log.is_empty().await);
    }

    #[tokio::test]
    async fn test_record_preserves_insertion_order() {
        // テスト項目: 記録したメッセージが挿入順で保持される
        // given (前提条件):
        let log = InMemoryMessageLog::new();

        // when (操作):
        log.record(create_test_message(1, "first")).await;
        log.record(create_test_message(2, "second")).await;
        log.record(create_test_message(1, "third")).await;

        // then (期待する結果):
        let bodies: Vec<String> = log
            .snapshot()
            .await
            .into_iter()
            .map(|m| m.body.into_string())
            .collect();
        assert_eq!(bodies, vec!["first", "second", "third"]);
        assert_eq!(log.len().await, 3);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached_copy() {
        // テスト項目: スナップショットを変更してもサーバー側の履歴は変わらない
        // given (前提条件):
        let log = InMemoryMessageLog::new();
        log.record(create_test_message(1, "kept")).await;

        // when (操作):
        let mut snapshot = log.snapshot().await;
        snapshot.clear();
        snapshot.push(create_test_message(9, "injected"));

        // then (期待する結果):
        let current = log.snapshot().await;
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].body.as_str(), "kept");
    }
}
