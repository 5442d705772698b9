//! In-memory backend with push subscriptions.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use super::codes::CodeProbe;
use super::Backend;
use crate::error::GameError;
use crate::types::*;

/// Messages returned per game, newest kept.
const MESSAGE_LIMIT: usize = 100;

const CHANNEL_CAPACITY: usize = 100;

/// Per-game broadcast channels. Each mutation pushes the full current result
/// set for the collection it touched.
struct GameChannels {
    game: broadcast::Sender<Game>,
    players: broadcast::Sender<Vec<Player>>,
    messages: broadcast::Sender<Vec<ChatMessage>>,
}

impl GameChannels {
    fn new() -> Self {
        Self {
            game: broadcast::channel(CHANNEL_CAPACITY).0,
            players: broadcast::channel(CHANNEL_CAPACITY).0,
            messages: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }
}

/// In-process document store: lookup-before-insert for players,
/// soft-deactivation for games, append-only messages and votes.
pub struct MemoryBackend {
    games: RwLock<HashMap<GameId, Game>>,
    players: RwLock<HashMap<String, Player>>,
    messages: RwLock<Vec<ChatMessage>>,
    votes: RwLock<Vec<Vote>>,
    channels: RwLock<HashMap<GameId, GameChannels>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            players: RwLock::new(HashMap::new()),
            messages: RwLock::new(Vec::new()),
            votes: RwLock::new(Vec::new()),
            channels: RwLock::new(HashMap::new()),
        }
    }

    async fn with_channels<R>(&self, game_id: &GameId, f: impl FnOnce(&GameChannels) -> R) -> R {
        let mut channels = self.channels.write().await;
        let entry = channels
            .entry(game_id.clone())
            .or_insert_with(GameChannels::new);
        f(entry)
    }

    async fn notify_game(&self, game_id: &GameId) {
        let game = self.games.read().await.get(game_id).cloned();
        if let Some(game) = game {
            // No receivers connected is fine
            self.with_channels(game_id, |ch| {
                let _ = ch.game.send(game);
            })
            .await;
        }
    }

    async fn notify_players(&self, game_id: &GameId) {
        let snapshot = self.players_snapshot(game_id).await;
        self.with_channels(game_id, |ch| {
            let _ = ch.players.send(snapshot);
        })
        .await;
    }

    async fn notify_messages(&self, game_id: &GameId) {
        let snapshot = self.messages_snapshot(game_id).await;
        self.with_channels(game_id, |ch| {
            let _ = ch.messages.send(snapshot);
        })
        .await;
    }

    async fn players_snapshot(&self, game_id: &GameId) -> Vec<Player> {
        let players = self.players.read().await;
        let mut list: Vec<Player> = players
            .values()
            .filter(|p| &p.game_id == game_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.id.cmp(&b.id)));
        list
    }

    async fn messages_snapshot(&self, game_id: &GameId) -> Vec<ChatMessage> {
        let messages = self.messages.read().await;
        let list: Vec<ChatMessage> = messages
            .iter()
            .filter(|m| &m.game_id == game_id)
            .cloned()
            .collect();
        if list.len() > MESSAGE_LIMIT {
            list[list.len() - MESSAGE_LIMIT..].to_vec()
        } else {
            list
        }
    }

    async fn append_message(&self, message: ChatMessage) -> Result<ChatMessage, GameError> {
        let game_id = message.game_id.clone();
        self.messages.write().await.push(message.clone());
        self.notify_messages(&game_id).await;
        Ok(message)
    }

    async fn find_player_doc(&self, game_id: &GameId, player_id: &PlayerId) -> Option<String> {
        let players = self.players.read().await;
        players
            .values()
            .find(|p| &p.game_id == game_id && &p.player_id == player_id)
            .map(|p| p.id.clone())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CodeProbe for MemoryBackend {
    async fn code_in_use(&self, code: &str) -> Result<bool, GameError> {
        let games = self.games.read().await;
        Ok(games.values().any(|g| g.game_code == code))
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn create_game(&self, game: Game) -> Result<GameId, GameError> {
        let game_id = game.id.clone();
        self.games.write().await.insert(game_id.clone(), game);
        self.notify_game(&game_id).await;
        Ok(game_id)
    }

    async fn find_game_by_code(&self, code: &str) -> Result<Option<Game>, GameError> {
        let code = code.trim().to_uppercase();
        let games = self.games.read().await;
        if let Some(game) = games.values().find(|g| g.game_code == code) {
            return Ok(Some(game.clone()));
        }
        // Fallback: a raw document id also resolves
        Ok(games.get(code.as_str()).cloned())
    }

    async fn get_game(&self, game_id: &GameId) -> Result<Option<Game>, GameError> {
        Ok(self.games.read().await.get(game_id).cloned())
    }

    async fn update_game_phase(
        &self,
        game_id: &GameId,
        phase: GamePhase,
        time_remaining: Option<u32>,
    ) -> Result<(), GameError> {
        {
            let mut games = self.games.write().await;
            let game = games
                .get_mut(game_id)
                .ok_or(GameError::NotFound)?;
            game.phase = phase;
            if let Some(t) = time_remaining {
                game.time_remaining = t;
            }
            game.updated_at = chrono::Utc::now().to_rfc3339();
        }
        tracing::debug!(game_id, ?phase, "game phase updated");
        self.notify_game(game_id).await;
        Ok(())
    }

    async fn update_game_timer(
        &self,
        game_id: &GameId,
        time_remaining: u32,
    ) -> Result<(), GameError> {
        {
            let mut games = self.games.write().await;
            let game = games
                .get_mut(game_id)
                .ok_or(GameError::NotFound)?;
            game.time_remaining = time_remaining;
            game.updated_at = chrono::Utc::now().to_rfc3339();
        }
        self.notify_game(game_id).await;
        Ok(())
    }

    async fn deactivate_game(&self, game_id: &GameId) -> Result<(), GameError> {
        {
            let mut games = self.games.write().await;
            let game = games
                .get_mut(game_id)
                .ok_or(GameError::NotFound)?;
            game.is_active = false;
            game.updated_at = chrono::Utc::now().to_rfc3339();
        }
        self.notify_game(game_id).await;
        Ok(())
    }

    async fn add_player(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
        player_name: &str,
    ) -> Result<(), GameError> {
        let now = chrono::Utc::now().to_rfc3339();

        // Lookup-before-insert: a returning player is only reconnected
        if let Some(doc_id) = self.find_player_doc(game_id, player_id).await {
            let mut players = self.players.write().await;
            if let Some(player) = players.get_mut(&doc_id) {
                player.is_connected = true;
                player.last_seen = now;
            }
            drop(players);
            self.notify_players(game_id).await;
            return Ok(());
        }

        let player = Player {
            id: ulid::Ulid::new().to_string(),
            game_id: game_id.clone(),
            player_id: player_id.clone(),
            player_name: player_name.to_string(),
            is_ready: false,
            is_connected: true,
            score: 0,
            persona: None,
            joined_at: now.clone(),
            last_seen: now,
        };
        self.players
            .write()
            .await
            .insert(player.id.clone(), player);

        {
            let mut games = self.games.write().await;
            if let Some(game) = games.get_mut(game_id) {
                game.current_players += 1;
                game.updated_at = chrono::Utc::now().to_rfc3339();
            }
        }
        self.notify_players(game_id).await;
        self.notify_game(game_id).await;
        Ok(())
    }

    async fn update_player_persona(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
        persona: Persona,
    ) -> Result<(), GameError> {
        let Some(doc_id) = self.find_player_doc(game_id, player_id).await else {
            tracing::warn!(game_id, player_id, "persona update for unknown player");
            return Ok(());
        };
        {
            let mut players = self.players.write().await;
            if let Some(player) = players.get_mut(&doc_id) {
                player.persona = Some(persona);
                player.is_ready = true;
            }
        }
        self.notify_players(game_id).await;
        Ok(())
    }

    async fn update_player_connection(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
        connected: bool,
    ) -> Result<(), GameError> {
        let Some(doc_id) = self.find_player_doc(game_id, player_id).await else {
            return Ok(());
        };
        {
            let mut players = self.players.write().await;
            if let Some(player) = players.get_mut(&doc_id) {
                player.is_connected = connected;
                player.last_seen = chrono::Utc::now().to_rfc3339();
            }
        }
        self.notify_players(game_id).await;
        Ok(())
    }

    async fn remove_player(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
    ) -> Result<(), GameError> {
        let Some(doc_id) = self.find_player_doc(game_id, player_id).await else {
            return Ok(());
        };
        self.players.write().await.remove(&doc_id);
        {
            let mut games = self.games.write().await;
            if let Some(game) = games.get_mut(game_id) {
                game.current_players = game.current_players.saturating_sub(1);
                game.updated_at = chrono::Utc::now().to_rfc3339();
            }
        }
        tracing::info!(game_id, player_id, "player removed");
        self.notify_players(game_id).await;
        self.notify_game(game_id).await;
        Ok(())
    }

    async fn list_players(&self, game_id: &GameId) -> Result<Vec<Player>, GameError> {
        Ok(self.players_snapshot(game_id).await)
    }

    async fn send_message(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
        player_name: &str,
        text: &str,
    ) -> Result<ChatMessage, GameError> {
        self.append_message(ChatMessage {
            id: ulid::Ulid::new().to_string(),
            game_id: game_id.clone(),
            player_id: player_id.clone(),
            player_name: player_name.to_string(),
            message: text.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            is_system_message: false,
        })
        .await
    }

    async fn send_system_message(
        &self,
        game_id: &GameId,
        text: &str,
    ) -> Result<ChatMessage, GameError> {
        self.append_message(ChatMessage {
            id: ulid::Ulid::new().to_string(),
            game_id: game_id.clone(),
            player_id: SYSTEM_SENDER_ID.to_string(),
            player_name: SYSTEM_SENDER_NAME.to_string(),
            message: text.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            is_system_message: true,
        })
        .await
    }

    async fn list_messages(&self, game_id: &GameId) -> Result<Vec<ChatMessage>, GameError> {
        Ok(self.messages_snapshot(game_id).await)
    }

    async fn submit_vote(
        &self,
        game_id: &GameId,
        voter_id: &PlayerId,
        target_id: &PlayerId,
        guess: &str,
        round: u32,
    ) -> Result<Vote, GameError> {
        let vote = Vote {
            id: ulid::Ulid::new().to_string(),
            game_id: game_id.clone(),
            voter_id: voter_id.clone(),
            target_id: target_id.clone(),
            guess: guess.to_string(),
            round,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        self.votes.write().await.push(vote.clone());
        Ok(vote)
    }

    async fn list_votes(
        &self,
        game_id: &GameId,
        round: Option<u32>,
    ) -> Result<Vec<Vote>, GameError> {
        let votes = self.votes.read().await;
        Ok(votes
            .iter()
            .filter(|v| &v.game_id == game_id && round.is_none_or(|r| v.round == r))
            .cloned()
            .collect())
    }

    async fn watch_game(&self, game_id: &GameId) -> broadcast::Receiver<Game> {
        self.with_channels(game_id, |ch| ch.game.subscribe()).await
    }

    async fn watch_players(&self, game_id: &GameId) -> broadcast::Receiver<Vec<Player>> {
        self.with_channels(game_id, |ch| ch.players.subscribe())
            .await
    }

    async fn watch_messages(&self, game_id: &GameId) -> broadcast::Receiver<Vec<ChatMessage>> {
        self.with_channels(game_id, |ch| ch.messages.subscribe())
            .await
    }
}
