//! HTTP API endpoint handlers for the admin listener.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use tower_http::trace::TraceLayer;

use crate::{
    infrastructure::dto::http::{ClientDto, ClientsDto, HealthDto, MessageDto},
    ui::state::AppState,
};

/// Health check endpoint
pub async fn health_check() -> Json<HealthDto> {
    Json(HealthDto {
        status: "ok".to_string(),
    })
}

/// Currently registered connections
pub async fn get_clients(State(state): State<Arc<AppState>>) -> Json<ClientsDto> {
    let clients = state.server_query_usecase.connected_clients().await;

    // Domain Model から DTO への変換
    let clients: Vec<ClientDto> = clients.into_iter().map(ClientDto::from).collect();
    Json(ClientsDto {
        count: clients.len(),
        clients,
    })
}

/// Every message relayed so far, oldest first
pub async fn get_messages(State(state): State<Arc<AppState>>) -> Json<Vec<MessageDto>> {
    let messages = state.server_query_usecase.message_history().await;
    Json(messages.into_iter().map(MessageDto::from).collect())
}

pub fn admin_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/clients", get(get_clients))
        .route("/api/messages", get(get_messages))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
