//! UseCase: read-only queries for embedders, tests and the admin API.

use std::sync::Arc;

use crate::{
    domain::{ConnectedClient, Message, MessageLog},
    infrastructure::registry::ClientRegistry,
};

/// サーバー状態取得のユースケース
pub struct ServerQueryUseCase {
    registry: Arc<ClientRegistry>,
    message_log: Arc<dyn MessageLog>,
}

impl ServerQueryUseCase {
    pub fn new(registry: Arc<ClientRegistry>, message_log: Arc<dyn MessageLog>) -> Self {
        Self {
            registry,
            message_log,
        }
    }

    /// Point-in-time number of registered connections
    pub async fn client_count(&self) -> usize {
        self.registry.len().await
    }

    /// Registered connections, in connection order
    pub async fn connected_clients(&self) -> Vec<ConnectedClient> {
        self.registry.clients().await
    }

    /// Owned copy of every broadcast message, in broadcast order
    pub async fn message_history(&self) -> Vec<Message> {
        self.message_log.snapshot().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{ConnectionId, MessageBody, Timestamp},
        infrastructure::{
            message_log::InMemoryMessageLog, registry::test_support::create_test_handle,
        },
    };

    #[tokio::test]
    async fn test_queries_reflect_state() {
        // テスト項目: 接続数・接続一覧・メッセージ履歴が現在の状態を反映する
        // given (前提条件):
        let registry = Arc::new(ClientRegistry::new());
        let (alice, _rx_a, _ca) = create_test_handle(1, 4);
        registry.register(alice).await;
        let log = Arc::new(InMemoryMessageLog::new());
        log.record(Message::new(
            ConnectionId::new(1),
            MessageBody::new("hi".to_string()).unwrap(),
            Timestamp::new(1),
        ))
        .await;
        let usecase = ServerQueryUseCase::new(registry, log);

        // when (操作):
        let count = usecase.client_count().await;
        let clients = usecase.connected_clients().await;
        let history = usecase.message_history().await;

        // then (期待する結果):
        assert_eq!(count, 1);
        assert_eq!(clients[0].id, ConnectionId::new(1));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].body.as_str(), "hi");
    }
}
