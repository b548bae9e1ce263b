//! Hiroba relay server.
//!
//! Accepts TCP clients and broadcasts every message it receives to all
//! connected clients, stamped with the server time.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hiroba-server
//! cargo run --bin hiroba-server -- 15214
//! cargo run --bin hiroba-server -- --host 0.0.0.0 --port 15214 --admin-port 8080
//! ```

use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use clap::Parser;
use hiroba_server::{
    BroadcastPolicy, RelayServer, ServerConfig, SlowClientPolicy,
    config::{DEFAULT_OUTBOUND_CAPACITY, DEFAULT_PORT, default_workers},
    infrastructure::dto::wire::DEFAULT_MAX_FRAME_LEN,
    ui::signal::shutdown_signal,
};
use hiroba_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "hiroba-server")]
#[command(about = "Multi-client message relay server", long_about = None)]
struct Args {
    /// Port number to listen on
    #[arg(value_name = "PORT", conflicts_with = "port")]
    port_arg: Option<u16>,

    /// Port number to listen on
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Number of connection handlers that may run at once
    #[arg(short = 'w', long, default_value_t = default_workers())]
    workers: usize,

    /// Capacity of each connection's outbound queue
    #[arg(long, default_value_t = DEFAULT_OUTBOUND_CAPACITY)]
    outbound_capacity: usize,

    /// Largest accepted frame payload in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
    max_frame_len: usize,

    /// Per-frame write timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    write_timeout_ms: u64,

    /// Do not echo a message back to its sender
    #[arg(long)]
    exclude_sender: bool,

    /// Disconnect clients whose outbound queue is full instead of skipping them
    #[arg(long)]
    disconnect_slow_clients: bool,

    /// Serve the read-only HTTP admin API on this port
    #[arg(long)]
    admin_port: Option<u16>,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let port = self.port_arg.or(self.port).unwrap_or(DEFAULT_PORT);
        ServerConfig {
            listen_addr: SocketAddr::new(self.host, port),
            admin_addr: self
                .admin_port
                .map(|admin_port| SocketAddr::new(self.host, admin_port)),
            workers: self.workers,
            outbound_capacity: self.outbound_capacity,
            max_frame_len: self.max_frame_len,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            broadcast_policy: if self.exclude_sender {
                BroadcastPolicy::ExcludeSender
            } else {
                BroadcastPolicy::IncludeSender
            },
            slow_client_policy: if self.disconnect_slow_clients {
                SlowClientPolicy::Disconnect
            } else {
                SlowClientPolicy::DropMessage
            },
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let config = Args::parse().into_config();

    let server = match RelayServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Usage: hiroba-server [PORT]");
            std::process::exit(1);
        }
    };

    let mut handle = match server.start().await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("Server error: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("Press Ctrl+C to shutdown gracefully");

    let accept_result = tokio::select! {
        _ = shutdown_signal() => Ok(()),
        result = handle.stopped() => result,
    };
    let stop_result = handle.stop().await;

    if let Err(e) = accept_result.and(stop_result) {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
