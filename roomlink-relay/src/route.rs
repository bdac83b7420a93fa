use crate::relay::Relay;
use crate::stats::StatsSnapshot;
use crate::websocket_listener;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use roomlink_core::{IceServer, RoomId};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub sessions: usize,
    pub rooms: usize,
    pub uptime_secs: u64,
}

/// Websocket endpoint plus the small HTTP surface next to it
pub fn create_relay_route(relay: Relay) -> Router {
    Router::new()
        .route("/ws", get(websocket_listener::handle_websocket))
        .route("/api/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/ice-servers", get(ice_servers))
        .route("/api/rooms/:room_id", get(room))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(relay)
}

async fn health(State(relay): State<Relay>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sessions: relay.session_count(),
        rooms: relay.room_count(),
        uptime_secs: relay.uptime().as_secs(),
    })
}

async fn stats(State(relay): State<Relay>) -> Json<StatsSnapshot> {
    Json(relay.stats())
}

async fn ice_servers(State(relay): State<Relay>) -> Json<Vec<IceServer>> {
    Json(relay.ice_servers().to_vec())
}

async fn room(State(relay): State<Relay>, Path(room_id): Path<String>) -> impl IntoResponse {
    match relay.room_summary(&RoomId::from(room_id)) {
        Ok(Some(summary)) => Json(summary).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
