//! Server configuration.

use std::{net::SocketAddr, num::NonZeroUsize, time::Duration};

use thiserror::Error;

use crate::infrastructure::dto::wire::DEFAULT_MAX_FRAME_LEN;

/// Well-known relay port
pub const DEFAULT_PORT: u16 = 15214;

/// Default capacity of each connection's outbound queue
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Default per-frame write timeout
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Which connections receive a broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadcastPolicy {
    /// Every registered connection, the sender included
    #[default]
    IncludeSender,
    /// Every registered connection except the sender
    ExcludeSender,
}

/// What to do when a target's outbound queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlowClientPolicy {
    /// Skip this message for that target only
    #[default]
    DropMessage,
    /// Skip the message and ask the target's handler to disconnect
    Disconnect,
}

/// Invalid startup configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("worker pool size must be at least 1")]
    ZeroWorkers,

    #[error("outbound queue capacity must be at least 1")]
    ZeroOutboundCapacity,

    #[error("maximum frame length must be at least 1 byte")]
    ZeroMaxFrameLen,

    #[error("write timeout must be greater than zero")]
    ZeroWriteTimeout,
}

/// Relay server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the relay listens on (port 0 picks an ephemeral port)
    pub listen_addr: SocketAddr,
    /// Address of the read-only HTTP admin endpoint, if enabled
    pub admin_addr: Option<SocketAddr>,
    /// Maximum number of concurrently running connection handlers
    pub workers: usize,
    pub outbound_capacity: usize,
    pub max_frame_len: usize,
    pub write_timeout: Duration,
    pub broadcast_policy: BroadcastPolicy,
    pub slow_client_policy: SlowClientPolicy,
}

impl ServerConfig {
    /// Default configuration listening on `listen_addr`
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            admin_addr: None,
            workers: default_workers(),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            broadcast_policy: BroadcastPolicy::default(),
            slow_client_policy: SlowClientPolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.outbound_capacity == 0 {
            return Err(ConfigError::ZeroOutboundCapacity);
        }
        if self.max_frame_len == 0 {
            return Err(ConfigError::ZeroMaxFrameLen);
        }
        if self.write_timeout.is_zero() {
            return Err(ConfigError::ZeroWriteTimeout);
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))
    }
}

/// One handler slot per available processing unit
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
