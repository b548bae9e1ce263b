//! UseCase: クライアント接続処理
//!
//! Registers an accepted connection and hands back the receiving ends that
//! the connection's tasks own.

use std::{net::SocketAddr, sync::Arc};

use hiroba_shared::time::Clock;
use tokio::sync::{mpsc, oneshot};

use crate::{
    domain::{ConnectedClient, ConnectionId, ConnectionIdFactory, Timestamp},
    infrastructure::registry::{ClientHandle, ClientRegistry, OutboundReceiver},
};

use super::error::ConnectError;

/// Receiving ends of a freshly registered connection
#[derive(Debug)]
pub struct ClientConnection {
    pub id: ConnectionId,
    pub connected_at: Timestamp,
    /// Drained by the connection's writer task
    pub outbound: OutboundReceiver,
    /// Fires when the server wants the handler to stop reading
    pub close: oneshot::Receiver<()>,
}

/// クライアント接続のユースケース
pub struct ConnectClientUseCase {
    registry: Arc<ClientRegistry>,
    clock: Arc<dyn Clock>,
    id_factory: ConnectionIdFactory,
    outbound_capacity: usize,
}

impl ConnectClientUseCase {
    pub fn new(registry: Arc<ClientRegistry>, clock: Arc<dyn Clock>, outbound_capacity: usize) -> Self {
        Self {
            registry,
            clock,
            id_factory: ConnectionIdFactory::new(),
            outbound_capacity,
        }
    }

    /// Allocate an id, create the bounded outbound queue and register the connection
    pub async fn execute(&self, peer_addr: SocketAddr) -> Result<ClientConnection, ConnectError> {
        let id = self.id_factory.generate();
        let connected_at = Timestamp::new(self.clock.now_millis());
        let (outbound_tx, outbound_rx) = mpsc::channel(self.outbound_capacity);
        let (close_tx, close_rx) = oneshot::channel();

        let info = ConnectedClient {
            id,
            peer_addr,
            connected_at,
        };
        if !self
            .registry
            .register(ClientHandle::new(info, outbound_tx, close_tx))
            .await
        {
            return Err(ConnectError::DuplicateConnection(id));
        }

        Ok(ClientConnection {
            id,
            connected_at,
            outbound: outbound_rx,
            close: close_rx,
        })
    }
}
