//! Terminal client for the Hiroba relay server.
//!
//! Connects to a relay server, sends every line typed at the prompt and
//! prints the messages relayed back, stamped with the server time.
//! Automatically reconnects on disconnection (max 5 attempts with 5 second interval).
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hiroba-client
//! cargo run --bin hiroba-client -- --host 192.168.0.10 --port 15214
//! ```

use clap::Parser;

use hiroba_server::config::DEFAULT_PORT;
use hiroba_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "hiroba-client")]
#[command(about = "Terminal client for the Hiroba message relay", long_about = None)]
struct Args {
    /// Relay server host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Relay server port
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    // Run the client
    if let Err(e) = hiroba_client::run_client(addr).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
