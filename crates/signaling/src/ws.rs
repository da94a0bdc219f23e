//! WebSocket-Endpunkt `GET /ws`
//!
//! Nimmt Upgrades an, reserviert einen Verbindungsplatz und startet pro
//! Verbindung eine [`ClientSession`]. Ist kein Platz frei oder faehrt der
//! Server herunter, wird mit 503 abgelehnt.
//!
//! Der Router muss mit `into_make_service_with_connect_info::<SocketAddr>()`
//! bedient werden, damit die Peer-Adresse in den Logs steht.

use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::connection::ClientSession;
use crate::server_state::SignalingState;

/// Axum-Router fuer den Signaling-Endpunkt
pub fn signaling_router(state: Arc<SignalingState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    State(state): State<Arc<SignalingState>>,
) -> Response {
    let peer_addr = connect_info
        .map(|ConnectInfo(addr)| addr)
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)));

    let Some(slot) = state.slot_reservieren() else {
        let grund = if state.faehrt_herunter() {
            "Server faehrt herunter"
        } else {
            "Maximale Verbindungsanzahl erreicht"
        };
        tracing::warn!(peer = %peer_addr, grund, "Verbindung abgelehnt");
        return (StatusCode::SERVICE_UNAVAILABLE, grund).into_response();
    };

    let max_bytes = state.config.max_frame_bytes;
    let session = ClientSession::neu(Arc::clone(&state), peer_addr);

    ws.max_message_size(max_bytes)
        .max_frame_size(max_bytes)
        .on_upgrade(move |socket| session.verarbeiten(socket, slot))
}
