//! UseCase: クライアント切断処理

use std::sync::Arc;

use crate::{
    domain::{ConnectedClient, ConnectionId},
    infrastructure::registry::ClientRegistry,
};

/// クライアント切断のユースケース
pub struct DisconnectClientUseCase {
    registry: Arc<ClientRegistry>,
}

impl DisconnectClientUseCase {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Remove one connection after its read loop ended.
    ///
    /// Returns `None` if it was already removed (e.g. by a shutdown sweep).
    pub async fn execute(&self, id: ConnectionId) -> Option<ConnectedClient> {
        self.registry.deregister(id).await
    }

    /// Shutdown sweep: remove every connection and signal each to close.
    ///
    /// Returns the number of connections that were registered.
    pub async fn disconnect_all(&self) -> usize {
        self.registry.close_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::registry::test_support::create_test_handle;

    #[tokio::test]
    async fn test_disconnect_removes_client() {
        // テスト項目: 切断したクライアントがレジストリから削除される
        // given (前提条件):
        let registry = Arc::new(ClientRegistry::new());
        let (alice, _rx_a, _ca) = create_test_handle(1, 4);
        let (bob, _rx_b, _cb) = create_test_handle(2, 4);
        registry.register(alice).await;
        registry.register(bob).await;
        let usecase = DisconnectClientUseCase::new(registry.clone());

        // when (操作):
        let removed = usecase.execute(ConnectionId::new(2)).await;

        // then (期待する結果):
        assert_eq!(removed.map(|c| c.id), Some(ConnectionId::new(2)));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_disconnect_after_sweep_is_noop() {
        // テスト項目: 一括切断後の個別切断は None を返す
        // given (前提条件):
        let registry = Arc::new(ClientRegistry::new());
        let (alice, _rx_a, _ca) = create_test_handle(1, 4);
        registry.register(alice).await;
        let usecase = DisconnectClientUseCase::new(registry.clone());
        assert_eq!(usecase.disconnect_all().await, 1);

        // when (操作):
        let removed = usecase.execute(ConnectionId::new(1)).await;

        // then (期待する結果):
        assert!(removed.is_none());
        assert!(registry.is_empty().await);
    }
}
