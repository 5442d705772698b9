//! WebSocket endpoint for legacy clients.
//!
//! Every socket receives the full chat fan-out; inbound messages are the
//! two operations the old transport knew: send a chat line and start the
//! game.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::server::ServerState;
use crate::store::Backend;
use crate::types::GamePhase;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut events_rx = state.events.subscribe();

    loop {
        tokio::select! {
            // Fan-out to this socket
            event = events_rx.recv() => {
                if let Ok(msg) = event {
                    if let Ok(json) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }

            // Inbound client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handle_message(client_msg, &state).await
                                {
                                    if let Ok(json) = serde_json::to_string(&response) {
                                        if sender.send(Message::Text(json.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "parse_error".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                if let Ok(json) = serde_json::to_string(&error) {
                                    let _ = sender.send(Message::Text(json.into())).await;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!("WebSocket connection closed");
}

/// Process one inbound message. A `Some` return is a direct reply to the
/// sending socket; chat and start events reach it through the fan-out
/// instead, like every other socket.
pub async fn handle_message(msg: ClientMessage, state: &ServerState) -> Option<ServerMessage> {
    match msg {
        ClientMessage::SendMessage {
            game_id,
            player_id,
            message,
        } => {
            let players = match state.backend.list_players(&game_id).await {
                Ok(players) => players,
                Err(err) => return Some(backend_error(err)),
            };
            let Some(player) = players.into_iter().find(|p| p.player_id == player_id) else {
                return Some(ServerMessage::Error {
                    code: "unknown_player".to_string(),
                    msg: "You are not in this game".to_string(),
                });
            };
            // Chat stays in character whenever a persona exists
            let sender_name = player
                .persona
                .as_ref()
                .map(|p| p.name.as_str())
                .unwrap_or(player.player_name.as_str())
                .to_string();

            match state
                .backend
                .send_message(&game_id, &player_id, &sender_name, &message)
                .await
            {
                Ok(stored) => {
                    state.broadcast(ServerMessage::ReceiveMessage { message: stored });
                    None
                }
                Err(err) => Some(backend_error(err)),
            }
        }

        ClientMessage::StartGame { game_id, player_id } => {
            let game = match state.backend.get_game(&game_id).await {
                Ok(Some(game)) => game,
                Ok(None) => {
                    return Some(ServerMessage::Error {
                        code: "not_found".to_string(),
                        msg: "Game not found".to_string(),
                    })
                }
                Err(err) => return Some(backend_error(err)),
            };
            if game.host_id != player_id {
                return Some(ServerMessage::Error {
                    code: "forbidden".to_string(),
                    msg: "Only the host can start the game".to_string(),
                });
            }

            let time_remaining = game.settings.round_duration;
            if let Err(err) = state
                .backend
                .update_game_phase(&game_id, GamePhase::Playing, Some(time_remaining))
                .await
            {
                return Some(backend_error(err));
            }
            if let Err(err) = state
                .backend
                .send_system_message(
                    &game_id,
                    "The game has begun! Chat with the other players to uncover their true identities.",
                )
                .await
            {
                tracing::warn!(%err, "failed to store start announcement");
            }

            state.broadcast(ServerMessage::GameStarted {
                game_id,
                time_remaining,
            });
            None
        }
    }
}

fn backend_error(err: crate::error::GameError) -> ServerMessage {
    tracing::error!(%err, "backend operation failed");
    ServerMessage::Error {
        code: "backend".to_string(),
        msg: err.user_message(),
    }
}
