//! HTTP API response DTOs for the admin endpoint.

use serde::{Deserialize, Serialize};

/// `GET /api/health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthDto {
    pub status: String,
}

/// One entry of `GET /api/clients`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDto {
    pub connection_id: u64,
    pub peer_addr: String,
    /// RFC 3339 (UTC)
    pub connected_at: String,
}

/// `GET /api/clients`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientsDto {
    pub count: usize,
    pub clients: Vec<ClientDto>,
}

/// One entry of `GET /api/messages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDto {
    pub sender: u64,
    pub body: String,
    pub client_timestamp: i64,
    pub server_timestamp: Option<i64>,
}
