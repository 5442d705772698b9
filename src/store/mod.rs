//! The document backend consumed by the session layer.
//!
//! [`Backend`] captures the client-observable contract: four logical
//! collections (games, players, messages, votes) with typed reads, writes and
//! push subscriptions. Subscriptions deliver the full current result set on
//! every change; there is no delta encoding. [`MemoryBackend`] is the
//! in-process implementation.

pub mod codes;
pub mod memory;

pub use memory::MemoryBackend;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::GameError;
use crate::types::*;

#[async_trait]
pub trait Backend: codes::CodeProbe + Send + Sync + 'static {
    // --- games ---

    /// Persist a new game document, returning its id.
    async fn create_game(&self, game: Game) -> Result<GameId, GameError>;

    /// Resolve a human-entered code to a game. The code is uppercased before
    /// the lookup; a raw document id is accepted as a fallback.
    async fn find_game_by_code(&self, code: &str) -> Result<Option<Game>, GameError>;

    async fn get_game(&self, game_id: &GameId) -> Result<Option<Game>, GameError>;

    /// Set the phase, optionally resetting the countdown in the same write.
    async fn update_game_phase(
        &self,
        game_id: &GameId,
        phase: GamePhase,
        time_remaining: Option<u32>,
    ) -> Result<(), GameError>;

    /// One-way timer sync from the host.
    async fn update_game_timer(&self, game_id: &GameId, time_remaining: u32)
        -> Result<(), GameError>;

    /// Soft-deactivate; the document stays queryable.
    async fn deactivate_game(&self, game_id: &GameId) -> Result<(), GameError>;

    // --- players ---

    /// Register a player in a game, incrementing the game's player counter.
    /// If a record for (game, player) already exists this only marks it
    /// connected again (lookup-before-insert, not a database constraint).
    async fn add_player(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
        player_name: &str,
    ) -> Result<(), GameError>;

    /// Store the persona on the player record and mark it ready.
    async fn update_player_persona(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
        persona: Persona,
    ) -> Result<(), GameError>;

    async fn update_player_connection(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
        connected: bool,
    ) -> Result<(), GameError>;

    /// Delete the player record and decrement the game's player counter.
    /// Removing an absent player is a harmless no-op.
    async fn remove_player(&self, game_id: &GameId, player_id: &PlayerId)
        -> Result<(), GameError>;

    /// Players of a game, ordered by join time ascending.
    async fn list_players(&self, game_id: &GameId) -> Result<Vec<Player>, GameError>;

    // --- messages ---

    async fn send_message(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
        player_name: &str,
        text: &str,
    ) -> Result<ChatMessage, GameError>;

    /// Append a narration message attributed to no player.
    async fn send_system_message(
        &self,
        game_id: &GameId,
        text: &str,
    ) -> Result<ChatMessage, GameError>;

    /// Most recent messages of a game (capped), timestamp ascending.
    async fn list_messages(&self, game_id: &GameId) -> Result<Vec<ChatMessage>, GameError>;

    // --- votes ---

    /// Append a vote, returning the stored record.
    async fn submit_vote(
        &self,
        game_id: &GameId,
        voter_id: &PlayerId,
        target_id: &PlayerId,
        guess: &str,
        round: u32,
    ) -> Result<Vote, GameError>;

    /// Votes of a game, optionally restricted to one round.
    async fn list_votes(&self, game_id: &GameId, round: Option<u32>)
        -> Result<Vec<Vote>, GameError>;

    // --- subscriptions ---

    async fn watch_game(&self, game_id: &GameId) -> broadcast::Receiver<Game>;
    async fn watch_players(&self, game_id: &GameId) -> broadcast::Receiver<Vec<Player>>;
    async fn watch_messages(&self, game_id: &GameId) -> broadcast::Receiver<Vec<ChatMessage>>;
}
