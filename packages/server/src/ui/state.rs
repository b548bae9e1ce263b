//! Server state shared by the acceptor, connection handlers and admin API.

use std::sync::Arc;

use hiroba_shared::time::Clock;
use tokio::sync::watch;

use crate::{
    config::ServerConfig,
    domain::MessageLog,
    infrastructure::registry::ClientRegistry,
    usecase::{
        BroadcastMessageUseCase, ConnectClientUseCase, DisconnectClientUseCase,
        ServerQueryUseCase,
    },
};

use super::pool::WorkerPool;

/// Shared application state
pub struct AppState {
    pub config: ServerConfig,
    /// ConnectClientUseCase（接続登録のユースケース）
    pub connect_client_usecase: ConnectClientUseCase,
    /// DisconnectClientUseCase（接続解除のユースケース）
    pub disconnect_client_usecase: DisconnectClientUseCase,
    /// BroadcastMessageUseCase（ブロードキャストのユースケース）
    pub broadcast_message_usecase: BroadcastMessageUseCase,
    /// ServerQueryUseCase（状態取得のユースケース）
    pub server_query_usecase: ServerQueryUseCase,
    /// Runs connection handlers and writer tasks
    pub pool: WorkerPool,
    /// Flips to `true` once; the accept loop and admin endpoint watch it
    pub shutdown: watch::Sender<bool>,
}

impl AppState {
    /// Wire up the registry, message log and use cases for one server
    pub fn new(config: ServerConfig, clock: Arc<dyn Clock>, message_log: Arc<dyn MessageLog>) -> Self {
        let registry = Arc::new(ClientRegistry::new());
        let (shutdown, _) = watch::channel(false);

        Self {
            connect_client_usecase: ConnectClientUseCase::new(
                registry.clone(),
                clock.clone(),
                config.outbound_capacity,
            ),
            disconnect_client_usecase: DisconnectClientUseCase::new(registry.clone()),
            broadcast_message_usecase: BroadcastMessageUseCase::new(
                registry.clone(),
                message_log.clone(),
                clock,
                config.broadcast_policy,
                config.slow_client_policy,
            ),
            server_query_usecase: ServerQueryUseCase::new(registry, message_log),
            pool: WorkerPool::new(config.workers),
            shutdown,
            config,
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Tell the accept loop and admin endpoint to stop
    pub fn trigger_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Resolves once shutdown has been triggered
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.shutdown.subscribe();
        // the sender lives in `self`, so this only fails if state is torn down
        let _ = rx.wait_for(|stopping| *stopping).await;
    }
}
