//! Connection Handler
//!
//! Owns the read half of one client connection for its whole life:
//!
//! ```text
//! Connected --(frame decoded)--> Connected        (message broadcast)
//! Connected --(bad frame)------> Connected        (frame dropped, logged)
//! Connected --(EOF / I/O error / server close)--> Disconnecting
//! Disconnecting --(deregistered, read half dropped)--> Closed
//! ```
//!
//! Frames are read strictly one at a time and each broadcast finishes before
//! the next read, so a connection's messages go out in the order they came in.

use std::{net::SocketAddr, sync::Arc};

use tokio::{io::AsyncRead, sync::oneshot};

use crate::{
    domain::ConnectionId,
    infrastructure::dto::{
        conversion::frame_to_message,
        wire::{MessageFrame, WireError, read_frame},
    },
    ui::state::AppState,
};

/// Why a connection left the `Connected` state
#[derive(Debug)]
pub enum DisconnectReason {
    /// Peer closed the stream at a frame boundary
    PeerClosed,
    /// I/O failure or an untrustworthy frame header
    ConnectionLost(WireError),
    /// The server asked this handler to stop (shutdown or slow-client policy)
    ServerClosed,
}

#[derive(Debug)]
enum HandlerState {
    Connected,
    Disconnecting(DisconnectReason),
    Closed(DisconnectReason),
}

pub struct ConnectionHandler<R> {
    id: ConnectionId,
    peer_addr: SocketAddr,
    reader: R,
    close: oneshot::Receiver<()>,
    state: Arc<AppState>,
}

impl<R> ConnectionHandler<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(
        id: ConnectionId,
        peer_addr: SocketAddr,
        reader: R,
        close: oneshot::Receiver<()>,
        state: Arc<AppState>,
    ) -> Self {
        Self {
            id,
            peer_addr,
            reader,
            close,
            state,
        }
    }

    /// Drive the connection to `Closed`
    pub async fn run(mut self) -> DisconnectReason {
        let mut handler_state = HandlerState::Connected;
        loop {
            handler_state = match handler_state {
                HandlerState::Connected => HandlerState::Disconnecting(self.read_loop().await),
                HandlerState::Disconnecting(reason) => {
                    self.disconnect(&reason).await;
                    HandlerState::Closed(reason)
                }
                // read half is dropped together with `self`
                HandlerState::Closed(reason) => return reason,
            };
        }
    }

    async fn read_loop(&mut self) -> DisconnectReason {
        let max_frame_len = self.state.config.max_frame_len;
        loop {
            tokio::select! {
                biased;
                _ = &mut self.close => return DisconnectReason::ServerClosed,
                frame = read_frame(&mut self.reader, max_frame_len) => match frame {
                    Ok(Some(frame)) => self.on_frame(frame).await,
                    Ok(None) => return DisconnectReason::PeerClosed,
                    Err(e) if e.is_fatal() => return DisconnectReason::ConnectionLost(e),
                    Err(e) => {
                        tracing::warn!(
                            "Received undecodable message from connection {} ({}): {}",
                            self.id,
                            self.peer_addr,
                            e
                        );
                    }
                },
            }
        }
    }

    async fn on_frame(&self, frame: MessageFrame) {
        let message = match frame_to_message(self.id, frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    "Received invalid message from connection {} ({}): {}",
                    self.id,
                    self.peer_addr,
                    e
                );
                return;
            }
        };

        match self
            .state
            .broadcast_message_usecase
            .execute(self.id, message)
            .await
        {
            Ok(report) => {
                tracing::debug!(
                    "Relayed message from {} to {} of {} targets",
                    self.id,
                    report.delivered,
                    report.targets
                );
            }
            Err(e) => {
                tracing::warn!("Failed to broadcast message from {}: {}", self.id, e);
            }
        }
    }

    async fn disconnect(&self, reason: &DisconnectReason) {
        match reason {
            DisconnectReason::PeerClosed => {
                tracing::info!("Connection {} closed by client {}", self.id, self.peer_addr);
            }
            DisconnectReason::ConnectionLost(e) => {
                tracing::info!(
                    "Connection lost from client {} ({}): {}",
                    self.peer_addr,
                    self.id,
                    e
                );
            }
            DisconnectReason::ServerClosed => {
                tracing::debug!("Connection {} closed by server", self.id);
            }
        }

        if self
            .state
            .disconnect_client_usecase
            .execute(self.id)
            .await
            .is_some()
        {
            tracing::debug!("Connection {} removed from registry", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hiroba_shared::time::FixedClock;
    use tokio::io::{AsyncWriteExt, DuplexStream};

    use super::*;
    use crate::{
        config::ServerConfig,
        infrastructure::{
            dto::wire::{encode_frame, write_frame},
            message_log::InMemoryMessageLog,
            registry::OutboundReceiver,
        },
        usecase::ClientConnection,
    };

    fn create_test_state() -> Arc<AppState> {
        let config = ServerConfig {
            max_frame_len: 1024,
            ..ServerConfig::default()
        };
        Arc::new(AppState::new(
            config,
            Arc::new(FixedClock::new(5_000)),
            Arc::new(InMemoryMessageLog::new()),
        ))
    }

    async fn connect(
        state: &Arc<AppState>,
    ) -> (
        ConnectionHandler<DuplexStream>,
        DuplexStream,
        OutboundReceiver,
    ) {
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let ClientConnection {
            id,
            outbound,
            close,
            ..
        } = state.connect_client_usecase.execute(peer).await.unwrap();
        let (client_side, server_side) = tokio::io::duplex(4096);
        let handler = ConnectionHandler::new(id, peer, server_side, close, state.clone());
        (handler, client_side, outbound)
    }

    #[tokio::test]
    async fn test_handler_broadcasts_frames_in_order() {
        // テスト項目: 受信したフレームが受信順にブロードキャストされる
        // given (前提条件):
        let state = create_test_state();
        let (handler, mut client, mut outbound) = connect(&state).await;
        let task = tokio::spawn(handler.run());

        // when (操作):
        for body in ["m1", "m2", "m3"] {
            write_frame(&mut client, &MessageFrame::outgoing(body, 1))
                .await
                .unwrap();
        }

        // then (期待する結果):
        for expected in ["m1", "m2", "m3"] {
            let message = outbound.recv().await.unwrap();
            assert_eq!(message.body.as_str(), expected);
            assert_eq!(message.server_timestamp().map(|t| t.value()), Some(5_000));
        }
        drop(client);
        assert!(matches!(task.await.unwrap(), DisconnectReason::PeerClosed));
    }

    #[tokio::test]
    async fn test_handler_skips_undecodable_frame() {
        // テスト項目: 解釈できないフレームは破棄され、接続は継続する
        // given (前提条件):
        let state = create_test_state();
        let (handler, mut client, mut outbound) = connect(&state).await;
        let task = tokio::spawn(handler.run());

        // when (操作):
        let garbage = b"{\"nope\":true}";
        client
            .write_all(&(garbage.len() as u32).to_be_bytes())
            .await
            .unwrap();
        client.write_all(garbage).await.unwrap();
        let mut v2 = MessageFrame::outgoing("future", 1);
        v2.version = 2;
        client.write_all(&encode_frame(&v2).unwrap()).await.unwrap();
        write_frame(&mut client, &MessageFrame::outgoing("valid", 1))
            .await
            .unwrap();

        // then (期待する結果):
        let message = outbound.recv().await.unwrap();
        assert_eq!(message.body.as_str(), "valid");
        assert_eq!(state.server_query_usecase.client_count().await, 1);
        assert_eq!(state.server_query_usecase.message_history().await.len(), 1);
        drop(client);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_handler_deregisters_on_peer_close() {
        // テスト項目: 相手が切断するとレジストリから削除される
        // given (前提条件):
        let state = create_test_state();
        let (handler, client, _outbound) = connect(&state).await;
        let task = tokio::spawn(handler.run());
        assert_eq!(state.server_query_usecase.client_count().await, 1);

        // when (操作):
        drop(client);
        let reason = task.await.unwrap();

        // then (期待する結果):
        assert!(matches!(reason, DisconnectReason::PeerClosed));
        assert_eq!(state.server_query_usecase.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_handler_disconnects_on_oversized_frame() {
        // テスト項目: 上限を超えるフレーム長を受け取ると接続を終了する
        // given (前提条件):
        let state = create_test_state();
        let (handler, mut client, _outbound) = connect(&state).await;
        let task = tokio::spawn(handler.run());

        // when (操作):
        client.write_all(&4096u32.to_be_bytes()).await.unwrap();
        let reason = task.await.unwrap();

        // then (期待する結果):
        assert!(matches!(
            reason,
            DisconnectReason::ConnectionLost(WireError::FrameTooLarge { .. })
        ));
        assert_eq!(state.server_query_usecase.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_handler_stops_on_server_close() {
        // テスト項目: サーバーからの切断通知で読み込みループが終了する
        // given (前提条件):
        let state = create_test_state();
        let (handler, _client, _outbound) = connect(&state).await;
        let task = tokio::spawn(handler.run());

        // when (操作):
        state.disconnect_client_usecase.disconnect_all().await;
        let reason = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("handler should stop")
            .unwrap();

        // then (期待する結果):
        assert!(matches!(reason, DisconnectReason::ServerClosed));
        assert_eq!(state.server_query_usecase.client_count().await, 0);
    }
}
