//! Shared process state and router for the HTTP/WebSocket surface.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::AuthService;
use crate::protocol::ServerMessage;
use crate::store::MemoryBackend;
use crate::{api, ws};

const EVENT_CHANNEL_CAPACITY: usize = 100;

pub struct ServerState {
    pub backend: Arc<MemoryBackend>,
    pub auth: Arc<AuthService>,
    /// Fan-out to every connected socket
    pub events: broadcast::Sender<ServerMessage>,
}

impl ServerState {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend: Arc::new(MemoryBackend::new()),
            auth: Arc::new(AuthService::new()),
            events,
        }
    }

    /// Broadcast to all connected sockets. Having no receivers is fine,
    /// nobody may be connected.
    pub fn broadcast(&self, msg: ServerMessage) {
        let _ = self.events.send(msg);
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/persona", post(api::create_persona))
        .route("/api/vote", post(api::submit_vote))
        .route("/api/score", get(api::scores))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
