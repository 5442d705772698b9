//! Wire messages of the plain WebSocket transport.
//!
//! Legacy clients speak this surface: chat inbound, chat fan-out and the
//! host's start signal. Session state itself is synchronized through the
//! store subscriptions, not through this socket.

use serde::{Deserialize, Serialize};

use crate::types::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    SendMessage {
        game_id: GameId,
        player_id: PlayerId,
        message: String,
    },
    StartGame {
        game_id: GameId,
        player_id: PlayerId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Chat fan-out, one per stored message, sent to every connected socket
    ReceiveMessage { message: ChatMessage },
    /// The host started the round
    GameStarted {
        game_id: GameId,
        time_remaining: u32,
    },
    Error { code: String, msg: String },
}
