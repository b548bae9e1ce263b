//! Client Registry
//!
//! The single piece of shared mutable connection state. Every read (fan-out,
//! size queries) and every write (insert on accept, remove on handler exit,
//! bulk close on shutdown) goes through one `tokio::sync::Mutex`.
//!
//! The registry never owns a socket. A [`ClientHandle`] only carries the
//! sender half of the connection's bounded outbound queue and a one-shot
//! close signal for the task that owns the read half.

use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::{Mutex, MutexGuard, mpsc, oneshot};

use crate::domain::{ConnectedClient, ConnectionId, Message};

/// Sender half of a connection's outbound queue
pub type OutboundSender = mpsc::Sender<Arc<Message>>;

/// Receiver half of a connection's outbound queue
pub type OutboundReceiver = mpsc::Receiver<Arc<Message>>;

/// Registered connections keyed by id (= accept order)
pub type ClientMap = BTreeMap<ConnectionId, ClientHandle>;

/// Result of handing one message to one connection's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Enqueued for the writer task
    Queued,
    /// Queue at capacity; the message was not enqueued
    QueueFull,
    /// Writer task is gone
    Closed,
}

/// Non-owning handle to a live connection
#[derive(Debug)]
pub struct ClientHandle {
    info: ConnectedClient,
    outbound: OutboundSender,
    close: Option<oneshot::Sender<()>>,
}

impl ClientHandle {
    pub fn new(info: ConnectedClient, outbound: OutboundSender, close: oneshot::Sender<()>) -> Self {
        Self {
            info,
            outbound,
            close: Some(close),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.info.id
    }

    pub fn info(&self) -> &ConnectedClient {
        &self.info
    }

    /// Enqueue without waiting
    pub fn try_deliver(&self, message: Arc<Message>) -> DeliveryOutcome {
        match self.outbound.try_send(message) {
            Ok(()) => DeliveryOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => DeliveryOutcome::QueueFull,
            Err(mpsc::error::TrySendError::Closed(_)) => DeliveryOutcome::Closed,
        }
    }

    /// Ask the owning handler to stop reading.
    ///
    /// Returns `false` if the signal was already sent or the handler is gone.
    pub fn signal_close(&mut self) -> bool {
        match self.close.take() {
            Some(close) => close.send(()).is_ok(),
            None => false,
        }
    }
}

/// Concurrency-safe set of live connections
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<ClientMap>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handle. Returns `false` (and drops nothing) if the id is already present.
    pub async fn register(&self, handle: ClientHandle) -> bool {
        let mut clients = self.clients.lock().await;
        let id = handle.id();
        if clients.contains_key(&id) {
            tracing::warn!("Connection {} is already registered", id);
            return false;
        }
        clients.insert(id, handle);
        tracing::debug!("Connection {} registered ({} live)", id, clients.len());
        true
    }

    /// Remove a handle, returning its info if it was present
    pub async fn deregister(&self, id: ConnectionId) -> Option<ConnectedClient> {
        let mut clients = self.clients.lock().await;
        let removed = clients.remove(&id).map(|handle| handle.info);
        if removed.is_some() {
            tracing::debug!("Connection {} deregistered ({} live)", id, clients.len());
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.clients.lock().await.contains_key(&id)
    }

    /// Snapshot of every registered connection, in connection order
    pub async fn clients(&self) -> Vec<ConnectedClient> {
        let clients = self.clients.lock().await;
        clients.values().map(|handle| handle.info.clone()).collect()
    }

    /// Drain the registry and signal every connection to close.
    ///
    /// Close failures (handler already gone) are logged and skipped. Dropping
    /// the drained handles also closes every outbound queue, which ends the
    /// writer tasks once their queues are flushed.
    pub async fn close_all(&self) -> usize {
        let drained = {
            let mut clients = self.clients.lock().await;
            std::mem::take(&mut *clients)
        };

        let count = drained.len();
        for (id, mut handle) in drained {
            if !handle.signal_close() {
                tracing::warn!("Unable to signal close to connection {}", id);
            }
        }
        count
    }

    /// Exclusive access for a fan-out pass
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ClientMap> {
        self.clients.lock().await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::Timestamp;

    /// Build a handle plus the receiving ends a real connection task would own
    pub(crate) fn create_test_handle(
        id: u64,
        capacity: usize,
    ) -> (ClientHandle, OutboundReceiver, oneshot::Receiver<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let (close_tx, close_rx) = oneshot::channel();
        let info = ConnectedClient {
            id: ConnectionId::new(id),
            peer_addr: format!("127.0.0.1:{}", 40000 + id).parse().unwrap(),
            connected_at: Timestamp::new(1000 + id as i64),
        };
        (ClientHandle::new(info, tx, close_tx), rx, close_rx)
    }
}
