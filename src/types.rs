use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type GameId = String;
pub type PlayerId = String;
pub type MessageId = String;
pub type VoteId = String;
pub type UserId = String;

/// Sender id/name used for system chat messages (narration of phase events).
pub const SYSTEM_SENDER_ID: &str = "system";
pub const SYSTEM_SENDER_NAME: &str = "System";

/// Phase as persisted on the game document. The host is the only writer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    Waiting,
    Playing,
    Voting,
    Reveal,
    Finished,
}

/// Local UI phase driven by the session. Superset of [`GamePhase`] with the
/// screens that exist only client-side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ViewPhase {
    Home,
    Auth,
    About,
    CreatePersona,
    Waiting,
    Playing,
    Voting,
    Reveal,
}

impl From<GamePhase> for ViewPhase {
    fn from(phase: GamePhase) -> Self {
        match phase {
            GamePhase::Waiting => ViewPhase::Waiting,
            GamePhase::Playing => ViewPhase::Playing,
            GamePhase::Voting => ViewPhase::Voting,
            GamePhase::Reveal => ViewPhase::Reveal,
            // A finished game has no screen of its own
            GamePhase::Finished => ViewPhase::Home,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameSettings {
    pub round_duration: u32,
    pub voting_duration: u32,
    pub min_players: u32,
    pub max_rounds: u32,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            round_duration: 300,
            voting_duration: 120,
            min_players: 3,
            max_rounds: 5,
        }
    }
}

/// A game document. Never physically deleted; `is_active` is flipped off
/// instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: GameId,
    /// Short human-shareable code, unique among queryable games
    pub game_code: String,
    pub host_id: UserId,
    pub host_name: String,
    pub phase: GamePhase,
    pub round: u32,
    pub max_players: u32,
    pub current_players: u32,
    /// Seconds left in the current phase, synced one-way by the host
    pub time_remaining: u32,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
    pub settings: GameSettings,
}

/// A player's invented fictional identity, the unit of deception in the game.
/// Embedded on the player record, no lifecycle of its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub name: String,
    /// Free text, not a number ("ageless", "about 40", ...)
    pub age: String,
    pub profession: String,
    pub traits: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backstory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hobbies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quirks: Option<Vec<String>>,
}

/// A player record. One per (game, player) pair, enforced by
/// lookup-before-insert in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub is_ready: bool,
    pub is_connected: bool,
    pub score: u32,
    pub persona: Option<Persona>,
    pub joined_at: String,
    pub last_seen: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub game_id: GameId,
    pub player_id: PlayerId,
    /// Persona name for in-character chat, account name otherwise
    pub player_name: String,
    pub message: String,
    pub timestamp: String,
    pub is_system_message: bool,
}

/// Append-only vote record. Nothing prevents a voter from voting twice in a
/// round; the reveal flow tolerates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: VoteId,
    pub game_id: GameId,
    pub voter_id: PlayerId,
    pub target_id: PlayerId,
    pub guess: String,
    pub round: u32,
    pub timestamp: String,
}

/// An authenticated account as seen by the game layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub uid: UserId,
    pub email: String,
    pub display_name: String,
    pub created_at: String,
    pub last_login: String,
    /// Declared aggregates, not maintained by the core flow
    pub games_played: u32,
    pub total_score: u32,
}
