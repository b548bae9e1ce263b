//! Server execution logic.
//!
//! `RelayServer::start` binds the listening socket (and the optional admin
//! endpoint), then hands back a `ServerHandle` while the accept loop runs in
//! the background. Each accepted connection is registered, gets a writer
//! task, and is queued on the worker pool for its handler.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use hiroba_shared::time::{Clock, SystemClock};
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

use crate::{
    config::ServerConfig,
    domain::{ConnectedClient, Message, MessageLog},
    infrastructure::{InMemoryMessageLog, outbound::pusher_loop},
    usecase::ClientConnection,
};

use super::{
    acceptor::Acceptor,
    error::{AcceptError, ServerError},
    handler::{connection::ConnectionHandler, http::admin_router},
    state::AppState,
};

/// Multi-client message relay
///
/// # Example
///
/// ```ignore
/// let server = RelayServer::new(ServerConfig::new("127.0.0.1:15214".parse()?))?;
/// let handle = server.start().await?;
/// shutdown_signal().await;
/// handle.stop().await?;
/// ```
pub struct RelayServer {
    config: ServerConfig,
    clock: Arc<dyn Clock>,
    message_log: Arc<dyn MessageLog>,
}

impl RelayServer {
    /// Validate `config` and prepare a server with the system clock and an
    /// in-memory message log
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;
        Ok(Self {
            config,
            clock: Arc::new(SystemClock),
            message_log: Arc::new(InMemoryMessageLog::new()),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the in-memory message log. `record` is awaited once per
    /// broadcast, before fan-out.
    pub fn with_message_log(mut self, message_log: Arc<dyn MessageLog>) -> Self {
        self.message_log = message_log;
        self
    }

    /// Bind the listening socket and start accepting connections
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the relay or admin address cannot be
    /// bound. Nothing is served in that case.
    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let listener = bind(self.config.listen_addr).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind {
                addr: self.config.listen_addr,
                source,
            })?;

        let admin_listener = match self.config.admin_addr {
            Some(addr) => Some(bind(addr).await?),
            None => None,
        };

        Ok(self.launch(listener, local_addr, admin_listener))
    }

    /// Start serving connections from `acceptor`
    fn launch<A: Acceptor>(
        self,
        acceptor: A,
        local_addr: SocketAddr,
        admin_listener: Option<TcpListener>,
    ) -> ServerHandle {
        let state = Arc::new(AppState::new(self.config, self.clock, self.message_log));
        tracing::info!(
            "Relay server listening on {} ({} workers)",
            local_addr,
            state.pool.size()
        );

        let (admin_addr, admin) = match admin_listener {
            Some(listener) => {
                let addr = listener.local_addr().ok();
                if let Some(addr) = addr {
                    tracing::info!("Admin endpoint listening on http://{}", addr);
                }
                (addr, Some(tokio::spawn(serve_admin(listener, state.clone()))))
            }
            None => (None, None),
        };

        let acceptor = tokio::spawn(accept_loop(acceptor, state.clone()));

        ServerHandle {
            local_addr,
            admin_addr,
            state,
            acceptor: Some(acceptor),
            admin,
        }
    }
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr).await.map_err(|source| {
        tracing::error!("Could not open server socket on {}: {}", addr, source);
        ServerError::Bind { addr, source }
    })
}

async fn serve_admin(listener: TcpListener, state: Arc<AppState>) {
    let app = admin_router(state.clone());
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { state.wait_for_shutdown().await })
        .await;
    if let Err(e) = result {
        tracing::error!("Admin endpoint error: {}", e);
    }
}

/// First pause after an accept failure caused by resource exhaustion
const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

async fn accept_loop<A: Acceptor>(mut acceptor: A, state: Arc<AppState>) -> Result<(), ServerError> {
    let mut backoff = ACCEPT_BACKOFF_MIN;
    let result = loop {
        tokio::select! {
            _ = state.wait_for_shutdown() => break Ok(()),
            accepted = acceptor.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    backoff = ACCEPT_BACKOFF_MIN;
                    handle_accept(&state, stream, peer_addr).await;
                }
                Err(e) => match AcceptError::classify(e) {
                    AcceptError::Transient(e) => {
                        tracing::warn!("Failed to accept connection: {}", e);
                    }
                    AcceptError::Throttled(e) => {
                        tracing::warn!(
                            "Failed to accept connection, retrying in {:?}: {}",
                            backoff,
                            e
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(backoff) => {}
                            _ = state.wait_for_shutdown() => break Ok(()),
                        }
                        backoff = (backoff * 2).min(ACCEPT_BACKOFF_MAX);
                    }
                    AcceptError::ListenerFailure(e) => {
                        tracing::error!("Listener failed, no longer accepting connections: {}", e);
                        break Err(ServerError::ListenerFailure(e));
                    }
                },
            },
        }
    };

    drop(acceptor);
    shutdown_sequence(&state).await;
    result
}

async fn handle_accept(state: &Arc<AppState>, stream: TcpStream, peer_addr: SocketAddr) {
    tracing::info!("Got connection from {}", peer_addr);
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("Unable to set TCP_NODELAY for {}: {}", peer_addr, e);
    }

    let ClientConnection {
        id,
        outbound,
        close,
        ..
    } = match state.connect_client_usecase.execute(peer_addr).await {
        Ok(connection) => connection,
        Err(e) => {
            tracing::error!("Failed to register connection from {}: {}", peer_addr, e);
            return;
        }
    };

    let (reader, writer) = stream.into_split();
    let writer_task = pusher_loop(id, outbound, writer, state.config.write_timeout);
    if let Err(e) = state.pool.spawn_detached(writer_task) {
        tracing::warn!("Dropping connection {}: {}", id, e);
        state.disconnect_client_usecase.execute(id).await;
        return;
    }

    let handler = ConnectionHandler::new(id, peer_addr, reader, close, state.clone());
    if let Err(e) = state.pool.spawn_handler(async move {
        handler.run().await;
    }) {
        tracing::warn!("Dropping connection {}: {}", id, e);
        state.disconnect_client_usecase.execute(id).await;
    }
}

/// Stop accepting, close every registered connection and stop the pool
/// from taking new work
async fn shutdown_sequence(state: &AppState) {
    state.trigger_shutdown();
    tracing::info!("Shutting down...");
    let closed = state.disconnect_client_usecase.disconnect_all().await;
    tracing::debug!("Closed {} connections", closed);
    state.pool.shutdown();
}

/// Handle to a running relay server
///
/// Dropping the handle triggers shutdown but does not wait for it; use
/// [`ServerHandle::stop`] to wait until every task has finished.
pub struct ServerHandle {
    local_addr: SocketAddr,
    admin_addr: Option<SocketAddr>,
    state: Arc<AppState>,
    acceptor: Option<JoinHandle<Result<(), ServerError>>>,
    admin: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address the relay listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin_addr
    }

    pub async fn client_count(&self) -> usize {
        self.state.server_query_usecase.client_count().await
    }

    pub async fn connected_clients(&self) -> Vec<ConnectedClient> {
        self.state.server_query_usecase.connected_clients().await
    }

    /// Every stamped message relayed so far, in broadcast order
    pub async fn messages(&self) -> Vec<Message> {
        self.state.server_query_usecase.message_history().await
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.is_shutting_down()
    }

    /// Trigger shutdown without waiting for it
    pub fn shutdown(&self) {
        self.state.trigger_shutdown();
    }

    /// Resolves once the accept loop has ended, either because shutdown was
    /// triggered or because the listener failed
    pub async fn stopped(&mut self) -> Result<(), ServerError> {
        let Some(acceptor) = self.acceptor.as_mut() else {
            return Ok(());
        };
        let result = acceptor.await;
        self.acceptor = None;
        result?
    }

    /// Shut the server down and wait until every connection is closed
    pub async fn stop(mut self) -> Result<(), ServerError> {
        self.shutdown();
        let result = self.stopped().await;

        self.state.pool.drain().await;
        if let Some(admin) = self.admin.take()
            && let Err(e) = admin.await
        {
            tracing::warn!("Admin endpoint task failed: {}", e);
        }

        tracing::info!("Server shutdown complete");
        result
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::infrastructure::dto::wire::{
        DEFAULT_MAX_FRAME_LEN, MessageFrame, read_frame, write_frame,
    };

    type AcceptResult = io::Result<(TcpStream, SocketAddr)>;

    /// Acceptor that replays whatever the test pushes into it
    struct ScriptedAcceptor {
        script: mpsc::UnboundedReceiver<AcceptResult>,
    }

    #[async_trait]
    impl Acceptor for ScriptedAcceptor {
        async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
            match self.script.recv().await {
                Some(result) => result,
                None => std::future::pending().await,
            }
        }
    }

    fn launch_scripted() -> (ServerHandle, mpsc::UnboundedSender<AcceptResult>) {
        let mut config = ServerConfig::new("127.0.0.1:0".parse().unwrap());
        config.workers = 4;
        let (script_tx, script_rx) = mpsc::unbounded_channel();
        let handle = RelayServer::new(config).unwrap().launch(
            ScriptedAcceptor { script: script_rx },
            "127.0.0.1:0".parse().unwrap(),
            None,
        );
        (handle, script_tx)
    }

    /// A connected pair: the server-side stream with its peer address, and the client side
    async fn tcp_pair() -> (AcceptResult, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        (listener.accept().await, client)
    }

    async fn wait_for_client_count(handle: &ServerHandle, expected: usize) {
        tokio::time::timeout(Duration::from_secs(3), async {
            while handle.client_count().await != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("client count not reached");
    }

    #[tokio::test]
    async fn test_accept_loop_keeps_running_after_transient_errors() {
        // テスト項目: 一時的な accept エラーの後も接続を受け付け、配信できる
        // given (前提条件):
        let (handle, script) = launch_scripted();
        script
            .send(Err(io::Error::from(io::ErrorKind::ConnectionAborted)))
            .unwrap();
        script.send(Err(io::Error::other("unexpected"))).unwrap();

        // when (操作):
        let (accepted, mut client) = tcp_pair().await;
        script.send(accepted).unwrap();
        wait_for_client_count(&handle, 1).await;
        write_frame(&mut client, &MessageFrame::outgoing("after errors", 1))
            .await
            .unwrap();

        // then (期待する結果):
        let echoed = read_frame(&mut client, DEFAULT_MAX_FRAME_LEN)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(echoed.body, "after errors");
        assert!(!handle.is_shutting_down());

        handle.stop().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_accept_loop_recovers_from_fd_exhaustion() {
        // テスト項目: ファイルディスクリプタ枯渇 (EMFILE/ENFILE) ではサーバーを止めず、解消後に接続を受け付ける
        // given (前提条件):
        let (handle, script) = launch_scripted();
        for code in [libc::EMFILE, libc::EMFILE, libc::ENFILE] {
            script.send(Err(io::Error::from_raw_os_error(code))).unwrap();
        }

        // when (操作):
        let (accepted, _client) = tcp_pair().await;
        script.send(accepted).unwrap();

        // then (期待する結果):
        wait_for_client_count(&handle, 1).await;
        assert!(!handle.is_shutting_down());

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_listener_failure_shuts_the_server_down() {
        // テスト項目: リスナー障害で accept ループが終了し、全接続が閉じられる
        // given (前提条件):
        let (mut handle, script) = launch_scripted();
        let (accepted, mut client) = tcp_pair().await;
        script.send(accepted).unwrap();
        wait_for_client_count(&handle, 1).await;

        // when (操作):
        script
            .send(Err(io::Error::from(io::ErrorKind::InvalidInput)))
            .unwrap();
        let result = tokio::time::timeout(Duration::from_secs(3), handle.stopped())
            .await
            .expect("accept loop should end");

        // then (期待する結果):
        assert!(matches!(result, Err(ServerError::ListenerFailure(_))));
        assert!(handle.is_shutting_down());
        assert_eq!(handle.client_count().await, 0);
        let closed = tokio::time::timeout(
            Duration::from_secs(3),
            read_frame(&mut client, DEFAULT_MAX_FRAME_LEN),
        )
        .await
        .expect("client should observe the close");
        assert!(matches!(closed, Ok(None) | Err(_)));

        handle.stop().await.unwrap();
    }
}
