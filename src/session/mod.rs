//! The state synchronizer: one [`GameSession`] per signed-in client.
//!
//! The session is the single source of truth for the UI. It bridges the
//! asynchronous backend operations and the three push subscriptions (game
//! document, player set, message set) into one coherent [`ViewState`],
//! and performs all phase transitions. Failures never propagate past this
//! layer; they land in the state's error slot as a banner message.

pub mod reducer;

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

use crate::error::{AuthError, GameError};
use crate::store::{codes, Backend};
use crate::types::*;

use reducer::{SessionEvent, ViewSettings, ViewState};

/// How many local ticks pass between host timer pushes. Follower clients
/// interpolate locally and may drift from the authoritative value by up to
/// this many seconds between syncs.
const TIMER_SYNC_INTERVAL: u32 = 10;

pub struct GameSession<B: Backend> {
    backend: Arc<B>,
    user: RwLock<Option<UserAccount>>,
    state: RwLock<ViewState>,
    /// Subscription forwarders and the countdown; aborted on leave/drop
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Handed to background tasks so they cannot keep the session alive
    weak: Weak<Self>,
}

impl<B: Backend> GameSession<B> {
    pub fn new(backend: Arc<B>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            backend,
            user: RwLock::new(None),
            state: RwLock::new(ViewState::default()),
            tasks: Mutex::new(Vec::new()),
            weak: weak.clone(),
        })
    }

    /// Adopt an authenticated account for this session.
    pub async fn sign_in_as(&self, account: UserAccount) {
        let event = SessionEvent::SignedIn {
            uid: account.uid.clone(),
            username: account.display_name.clone(),
        };
        *self.user.write().await = Some(account);
        self.apply(event).await;
    }

    /// Snapshot of the current render-ready state.
    pub async fn state(&self) -> ViewState {
        self.state.read().await.clone()
    }

    /// Create a game and register the caller as host and first player.
    /// Returns the shareable game code.
    pub async fn create_game(
        &self,
        max_players: u32,
        round_duration: u32,
    ) -> Result<String, GameError> {
        match self.try_create_game(max_players, round_duration).await {
            Ok(code) => Ok(code),
            Err(err) => {
                tracing::error!(%err, "failed to create game");
                self.fail(err).await
            }
        }
    }

    async fn try_create_game(
        &self,
        max_players: u32,
        round_duration: u32,
    ) -> Result<String, GameError> {
        let user = self.require_user().await?;
        let game_code = codes::generate_unique(self.backend.as_ref()).await?;

        let now = chrono::Utc::now().to_rfc3339();
        let game = Game {
            id: ulid::Ulid::new().to_string(),
            game_code: game_code.clone(),
            host_id: user.uid.clone(),
            host_name: user.display_name.clone(),
            phase: GamePhase::Waiting,
            round: 1,
            max_players,
            current_players: 0,
            time_remaining: round_duration,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
            settings: GameSettings {
                round_duration,
                ..GameSettings::default()
            },
        };
        let settings = ViewSettings::from_game(&game);

        let game_id = self.backend.create_game(game).await?;
        self.backend
            .add_player(&game_id, &user.uid, &user.display_name)
            .await?;

        tracing::info!(game_id, game_code, "game created");
        self.apply(SessionEvent::GameCreated {
            game_id: game_id.clone(),
            game_code: game_code.clone(),
            settings,
        })
        .await;
        self.start_tasks(&game_id).await;
        Ok(game_code)
    }

    /// Join an existing game by its shareable code.
    pub async fn join_game(&self, code: &str) -> Result<(), GameError> {
        match self.try_join_game(code).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(%err, code, "failed to join game");
                self.fail(err).await
            }
        }
    }

    async fn try_join_game(&self, code: &str) -> Result<(), GameError> {
        let user = self.require_user().await?;
        let game = self
            .backend
            .find_game_by_code(code)
            .await?
            .ok_or(GameError::NotFound)?;
        if game.current_players >= game.max_players {
            return Err(GameError::Full);
        }
        if !game.is_active {
            return Err(GameError::Inactive);
        }

        // Rejoining players are reconnected, not duplicated
        let players = self.backend.list_players(&game.id).await?;
        let already_in_game = players.iter().any(|p| p.player_id == user.uid);
        if !already_in_game {
            self.backend
                .add_player(&game.id, &user.uid, &user.display_name)
                .await?;
        } else {
            self.backend
                .update_player_connection(&game.id, &user.uid, true)
                .await?;
        }

        tracing::info!(game_id = game.id, code = game.game_code, "joined game");
        self.apply(SessionEvent::GameJoined {
            game_id: game.id.clone(),
            game_code: game.game_code.clone(),
            settings: ViewSettings::from_game(&game),
        })
        .await;
        self.start_tasks(&game.id).await;
        Ok(())
    }

    /// Persist the caller's persona and move on to the waiting room.
    /// Without an active game or signed-in user this does nothing.
    pub async fn create_persona(&self, persona: Persona) -> Result<(), GameError> {
        let (Some(user), Some(game_id)) = self.context().await else {
            return Ok(());
        };
        match self.try_create_persona(&user, &game_id, persona).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::error!(%err, "failed to create persona");
                self.fail(err).await
            }
        }
    }

    async fn try_create_persona(
        &self,
        user: &UserAccount,
        game_id: &GameId,
        persona: Persona,
    ) -> Result<(), GameError> {
        self.backend
            .update_player_persona(game_id, &user.uid, persona.clone())
            .await?;
        let announcement = format!("{} joined the game!", persona.name);
        self.apply(SessionEvent::PersonaCreated(persona)).await;
        self.backend
            .send_system_message(game_id, &announcement)
            .await?;
        Ok(())
    }

    /// Send a chat message in character. Messages are attributed to the
    /// persona's name, never the account name; without a persona this is a
    /// no-op.
    pub async fn send_message(&self, text: &str) -> Result<(), GameError> {
        let (Some(user), Some(game_id)) = self.context().await else {
            return Ok(());
        };
        let Some(persona_name) = self
            .state
            .read()
            .await
            .current_player
            .persona
            .as_ref()
            .map(|p| p.name.clone())
        else {
            return Ok(());
        };
        match self
            .backend
            .send_message(&game_id, &user.uid, &persona_name, text)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                tracing::error!(%err, "failed to send message");
                self.fail(err).await
            }
        }
    }

    /// Record a vote against `target_id` and show this caller the reveal
    /// screen immediately. The jump is per-caller by design: voters do not
    /// wait for a quorum.
    pub async fn submit_vote(&self, target_id: &PlayerId, guess: &str) -> Result<(), GameError> {
        let (Some(user), Some(game_id)) = self.context().await else {
            return Ok(());
        };
        let round = self.state.read().await.round;
        match self
            .backend
            .submit_vote(&game_id, &user.uid, target_id, guess, round)
            .await
        {
            Ok(vote) => {
                self.apply(SessionEvent::VoteSubmitted(vote)).await;
                Ok(())
            }
            Err(err) => {
                tracing::error!(%err, "failed to submit vote");
                self.fail(err).await
            }
        }
    }

    /// Host only: start the round. Non-hosts are a no-op.
    pub async fn start_game(&self) -> Result<(), GameError> {
        let Some(game_id) = self.host_game_id().await else {
            return Ok(());
        };
        let round_duration = self
            .state
            .read()
            .await
            .settings
            .map(|s| s.round_duration)
            .unwrap_or_else(|| GameSettings::default().round_duration);

        match self
            .try_advance_phase(
                &game_id,
                GamePhase::Playing,
                round_duration,
                "The game has begun! Chat with the other players to uncover their true identities.",
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::error!(%err, "failed to start game");
                self.fail(err).await
            }
        }
    }

    /// Host only: open the voting phase. Non-hosts are a no-op.
    pub async fn start_voting(&self) -> Result<(), GameError> {
        let Some(game_id) = self.host_game_id().await else {
            return Ok(());
        };
        let voting_duration = self
            .state
            .read()
            .await
            .settings
            .map(|s| s.voting_duration)
            .unwrap_or_else(|| GameSettings::default().voting_duration);

        match self
            .try_advance_phase(
                &game_id,
                GamePhase::Voting,
                voting_duration,
                "Voting has started! Choose who you think you have unmasked.",
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::error!(%err, "failed to start voting");
                self.fail(err).await
            }
        }
    }

    async fn try_advance_phase(
        &self,
        game_id: &GameId,
        phase: GamePhase,
        time_remaining: u32,
        announcement: &str,
    ) -> Result<(), GameError> {
        self.backend
            .update_game_phase(game_id, phase, Some(time_remaining))
            .await?;
        self.backend
            .send_system_message(game_id, announcement)
            .await?;
        Ok(())
    }

    /// Leave the current game: backend removal is attempted but its failure
    /// is harmless, the local reset happens regardless. Idempotent.
    pub async fn leave_game(&self) -> Result<(), GameError> {
        let (user, game_id) = self.context().await;
        if let (Some(user), Some(game_id)) = (user, game_id) {
            if let Err(err) = self.backend.remove_player(&game_id, &user.uid).await {
                tracing::warn!(%err, game_id, "leaving game: backend removal failed");
            }
        }
        self.stop_tasks();
        self.apply(SessionEvent::Left).await;
        Ok(())
    }

    /// Mark the caller disconnected without leaving the game (clean
    /// teardown; there is no heartbeat for crashed clients).
    pub async fn disconnect(&self) {
        if let (Some(user), Some(game_id)) = self.context().await {
            if let Err(err) = self
                .backend
                .update_player_connection(&game_id, &user.uid, false)
                .await
            {
                tracing::warn!(%err, game_id, "failed to mark player disconnected");
            }
        }
    }

    /// Direct local phase override, used for static screens.
    pub async fn set_phase(&self, phase: ViewPhase) {
        self.apply(SessionEvent::PhaseSet(phase)).await;
    }

    pub async fn clear_error(&self) {
        self.apply(SessionEvent::ErrorCleared).await;
    }

    /// One countdown second. Runs once per second from the background task;
    /// exposed so tests can drive simulated time.
    ///
    /// The host pushes the decremented value to the backend every
    /// [`TIMER_SYNC_INTERVAL`] ticks, and on the tick that reaches zero
    /// issues the phase transition: playing rolls into voting, voting into
    /// reveal. Followers only ever decrement locally and take the
    /// authoritative value from the game subscription.
    pub async fn tick(&self) {
        let (phase, time_remaining, is_host, game_id) = {
            let state = self.state.read().await;
            (
                state.phase,
                state.time_remaining,
                state.is_host,
                state.game_id.clone(),
            )
        };

        if !matches!(phase, ViewPhase::Playing | ViewPhase::Voting) || time_remaining == 0 {
            return;
        }
        self.apply(SessionEvent::Tick).await;

        let Some(game_id) = game_id else { return };
        if !is_host {
            return;
        }

        if time_remaining % TIMER_SYNC_INTERVAL == 0 {
            if let Err(err) = self
                .backend
                .update_game_timer(&game_id, time_remaining - 1)
                .await
            {
                tracing::warn!(%err, "timer sync failed");
            }
        }

        if time_remaining == 1 {
            match phase {
                ViewPhase::Playing => {
                    let _ = self.start_voting().await;
                }
                ViewPhase::Voting => {
                    if let Err(err) = self
                        .backend
                        .update_game_phase(&game_id, GamePhase::Reveal, None)
                        .await
                    {
                        tracing::error!(%err, "failed to advance to reveal");
                        self.apply(SessionEvent::Failed(err)).await;
                    }
                }
                _ => {}
            }
        }
    }

    // --- internals ---

    async fn apply(&self, event: SessionEvent) {
        let mut state = self.state.write().await;
        reducer::apply(&mut state, event);
    }

    /// Record the error in the banner slot and hand it back to the caller.
    async fn fail<T>(&self, err: GameError) -> Result<T, GameError> {
        self.apply(SessionEvent::Failed(err.clone())).await;
        Err(err)
    }

    async fn require_user(&self) -> Result<UserAccount, GameError> {
        self.user
            .read()
            .await
            .clone()
            .ok_or(GameError::Auth(AuthError::NotSignedIn))
    }

    async fn context(&self) -> (Option<UserAccount>, Option<GameId>) {
        let user = self.user.read().await.clone();
        let game_id = self.state.read().await.game_id.clone();
        (user, game_id)
    }

    async fn host_game_id(&self) -> Option<GameId> {
        let state = self.state.read().await;
        if state.is_host {
            state.game_id.clone()
        } else {
            None
        }
    }

    /// Register the three subscriptions, prime the state with the current
    /// snapshots and start the countdown.
    async fn start_tasks(&self, game_id: &GameId) {
        self.stop_tasks();

        // Subscribe before priming so no change is lost in between; a
        // duplicate snapshot is harmless since each merge is idempotent.
        let game_rx = self.backend.watch_game(game_id).await;
        let players_rx = self.backend.watch_players(game_id).await;
        let messages_rx = self.backend.watch_messages(game_id).await;

        match self.backend.get_game(game_id).await {
            Ok(Some(game)) => self.apply(SessionEvent::GameChanged(game)).await,
            Ok(None) => tracing::warn!(game_id, "game vanished before first snapshot"),
            Err(err) => tracing::warn!(%err, "failed to prime game snapshot"),
        }
        if let Ok(players) = self.backend.list_players(game_id).await {
            self.apply(SessionEvent::PlayersChanged(players)).await;
        }
        if let Ok(messages) = self.backend.list_messages(game_id).await {
            self.apply(SessionEvent::MessagesChanged(messages)).await;
        }

        let mut tasks = vec![
            forward(self.weak.clone(), game_rx, SessionEvent::GameChanged),
            forward(self.weak.clone(), players_rx, SessionEvent::PlayersChanged),
            forward(self.weak.clone(), messages_rx, SessionEvent::MessagesChanged),
        ];

        // Local countdown, one tick per second
        let weak = self.weak.clone();
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(session) = weak.upgrade() else { break };
                session.tick().await;
            }
        }));

        *self.tasks.lock().unwrap() = tasks;
    }

    /// Stops further snapshot delivery. In-flight backend calls are not
    /// cancelled.
    fn stop_tasks(&self) {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}

impl<B: Backend> Drop for GameSession<B> {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

/// Spawn a task forwarding snapshots from one subscription into the reducer.
fn forward<B, T>(
    weak: Weak<GameSession<B>>,
    mut rx: broadcast::Receiver<T>,
    into_event: fn(T) -> SessionEvent,
) -> JoinHandle<()>
where
    B: Backend,
    T: Clone + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(snapshot) => {
                    let Some(session) = weak.upgrade() else { break };
                    session.apply(into_event(snapshot)).await;
                }
                // A dropped snapshot is recovered by the next one; every
                // delivery carries the full result set.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;

    async fn test_account(name: &str) -> UserAccount {
        let now = chrono::Utc::now().to_rfc3339();
        UserAccount {
            uid: ulid::Ulid::new().to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            display_name: name.to_string(),
            created_at: now.clone(),
            last_login: now,
            games_played: 0,
            total_score: 0,
        }
    }

    async fn session_with_user(
        backend: &Arc<MemoryBackend>,
        name: &str,
    ) -> Arc<GameSession<MemoryBackend>> {
        let session = GameSession::new(backend.clone());
        session.sign_in_as(test_account(name).await).await;
        session
    }

    /// Let the spawned subscription forwarders drain pending snapshots.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    fn persona(name: &str) -> Persona {
        Persona {
            name: name.to_string(),
            age: "34".to_string(),
            profession: "Lighthouse keeper".to_string(),
            traits: "stoic, fond of fog".to_string(),
            backstory: None,
            hobbies: Some(vec!["collecting lenses".to_string()]),
            quirks: None,
        }
    }

    #[tokio::test]
    async fn test_create_game_requires_signed_in_user() {
        let backend = Arc::new(MemoryBackend::new());
        let session = GameSession::new(backend);

        let err = session.create_game(6, 300).await.unwrap_err();
        assert_eq!(err, GameError::Auth(AuthError::NotSignedIn));
        let state = session.state().await;
        assert_eq!(state.phase, ViewPhase::Home);
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn test_create_game_registers_host_and_switches_phase() {
        let backend = Arc::new(MemoryBackend::new());
        let session = session_with_user(&backend, "Alice").await;

        let code = session.create_game(6, 300).await.unwrap();
        assert_eq!(code.len(), 6);

        let state = session.state().await;
        assert_eq!(state.phase, ViewPhase::CreatePersona);
        assert!(state.is_host);
        assert_eq!(state.game_code.as_deref(), Some(code.as_str()));

        let game = backend.find_game_by_code(&code).await.unwrap().unwrap();
        assert_eq!(game.phase, GamePhase::Waiting);
        assert_eq!(game.current_players, 1);
        assert_eq!(game.settings.round_duration, 300);
        assert_eq!(game.settings.voting_duration, 120);
    }

    #[tokio::test]
    async fn test_join_game_unknown_code() {
        let backend = Arc::new(MemoryBackend::new());
        let session = session_with_user(&backend, "Bob").await;

        let err = session.join_game("NOSUCH").await.unwrap_err();
        assert_eq!(err, GameError::NotFound);
        assert_eq!(session.state().await.phase, ViewPhase::Home);
    }

    #[tokio::test]
    async fn test_join_full_game_leaves_phase_unchanged() {
        let backend = Arc::new(MemoryBackend::new());
        let host = session_with_user(&backend, "Alice").await;
        let code = host.create_game(2, 300).await.unwrap();

        let second = session_with_user(&backend, "Bob").await;
        second.join_game(&code).await.unwrap();

        let third = session_with_user(&backend, "Carol").await;
        let err = third.join_game(&code).await.unwrap_err();
        assert_eq!(err, GameError::Full);

        let state = third.state().await;
        assert_eq!(state.phase, ViewPhase::Home);
        assert_eq!(state.error.as_deref(), Some("This game is full"));
    }

    #[tokio::test]
    async fn test_join_inactive_game() {
        let backend = Arc::new(MemoryBackend::new());
        let host = session_with_user(&backend, "Alice").await;
        let code = host.create_game(6, 300).await.unwrap();
        let game = backend.find_game_by_code(&code).await.unwrap().unwrap();
        backend.deactivate_game(&game.id).await.unwrap();

        let joiner = session_with_user(&backend, "Bob").await;
        let err = joiner.join_game(&code).await.unwrap_err();
        assert_eq!(err, GameError::Inactive);
    }

    #[tokio::test]
    async fn test_rejoining_does_not_duplicate_player() {
        let backend = Arc::new(MemoryBackend::new());
        let host = session_with_user(&backend, "Alice").await;
        let code = host.create_game(6, 300).await.unwrap();

        // Host re-enters their own game through the join flow
        host.join_game(&code).await.unwrap();
        let game = backend.find_game_by_code(&code).await.unwrap().unwrap();
        assert_eq!(game.current_players, 1);
    }

    #[tokio::test]
    async fn test_messages_attributed_to_persona_name() {
        let backend = Arc::new(MemoryBackend::new());
        let session = session_with_user(&backend, "Alice").await;
        session.create_game(6, 300).await.unwrap();

        session.create_persona(persona("Captain Foghorn")).await.unwrap();
        session.send_message("hi").await.unwrap();
        settle().await;

        let state = session.state().await;
        assert_eq!(state.phase, ViewPhase::Waiting);
        let last = state.messages.last().unwrap();
        assert_eq!(last.player_name, "Captain Foghorn");
        assert!(!last.is_system_message);
        // The persona announcement arrived as a system message before it
        assert!(state
            .messages
            .iter()
            .any(|m| m.is_system_message && m.message.contains("Captain Foghorn")));
    }

    #[tokio::test]
    async fn test_send_message_without_persona_is_noop() {
        let backend = Arc::new(MemoryBackend::new());
        let session = session_with_user(&backend, "Alice").await;
        session.create_game(6, 300).await.unwrap();

        session.send_message("too early").await.unwrap();
        settle().await;
        assert!(session.state().await.messages.is_empty());
    }

    #[tokio::test]
    async fn test_start_game_is_host_only() {
        let backend = Arc::new(MemoryBackend::new());
        let host = session_with_user(&backend, "Alice").await;
        let code = host.create_game(6, 300).await.unwrap();
        let guest = session_with_user(&backend, "Bob").await;
        guest.join_game(&code).await.unwrap();

        guest.start_game().await.unwrap();
        let game = backend.find_game_by_code(&code).await.unwrap().unwrap();
        assert_eq!(game.phase, GamePhase::Waiting, "guest must not start the game");

        host.start_game().await.unwrap();
        settle().await;
        let game = backend.find_game_by_code(&code).await.unwrap().unwrap();
        assert_eq!(game.phase, GamePhase::Playing);
        assert_eq!(game.time_remaining, 300);

        // Both clients follow the remote phase through their subscriptions
        assert_eq!(host.state().await.phase, ViewPhase::Playing);
        assert_eq!(guest.state().await.phase, ViewPhase::Playing);
    }

    #[tokio::test]
    async fn test_submit_vote_appends_and_jumps_to_reveal() {
        let backend = Arc::new(MemoryBackend::new());
        let session = session_with_user(&backend, "Alice").await;
        let code = session.create_game(6, 300).await.unwrap();
        session.create_persona(persona("Madame Violet")).await.unwrap();

        session.submit_vote(&"target".to_string(), "guess text").await.unwrap();

        let state = session.state().await;
        assert_eq!(state.phase, ViewPhase::Reveal);
        assert_eq!(state.votes.len(), 1);
        assert_eq!(state.votes[0].guess, "guess text");
        assert_eq!(state.votes[0].target_id, "target");

        let game = backend.find_game_by_code(&code).await.unwrap().unwrap();
        let stored = backend.list_votes(&game.id, Some(1)).await.unwrap();
        assert_eq!(stored.len(), 1, "exactly one vote persisted");
    }

    #[tokio::test]
    async fn test_countdown_reaching_zero_starts_voting_once() {
        let backend = Arc::new(MemoryBackend::new());
        let session = session_with_user(&backend, "Alice").await;
        let code = session.create_game(6, 300).await.unwrap();
        let game_id = backend
            .find_game_by_code(&code)
            .await
            .unwrap()
            .unwrap()
            .id;

        session.create_persona(persona("The Professor")).await.unwrap();
        session.start_game().await.unwrap();
        settle().await;

        // Simulate a nearly elapsed round
        backend.update_game_timer(&game_id, 5).await.unwrap();
        settle().await;
        assert_eq!(session.state().await.time_remaining, 5);

        for _ in 0..5 {
            session.tick().await;
        }
        settle().await;

        let state = session.state().await;
        assert_eq!(state.phase, ViewPhase::Voting);
        assert_eq!(state.time_remaining, 120);

        let game = backend.get_game(&game_id).await.unwrap().unwrap();
        assert_eq!(game.phase, GamePhase::Voting);
        assert_eq!(game.time_remaining, 120);

        // Exactly one transition: one voting announcement in the log
        let announcements = backend
            .list_messages(&game_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.is_system_message && m.message.starts_with("Voting has started"))
            .count();
        assert_eq!(announcements, 1);
    }

    #[tokio::test]
    async fn test_countdown_in_voting_advances_to_reveal() {
        let backend = Arc::new(MemoryBackend::new());
        let session = session_with_user(&backend, "Alice").await;
        let code = session.create_game(6, 300).await.unwrap();
        let game_id = backend
            .find_game_by_code(&code)
            .await
            .unwrap()
            .unwrap()
            .id;

        session.create_persona(persona("The Professor")).await.unwrap();
        session.start_game().await.unwrap();
        session.start_voting().await.unwrap();
        settle().await;

        backend.update_game_timer(&game_id, 2).await.unwrap();
        settle().await;

        session.tick().await;
        session.tick().await;
        settle().await;

        let game = backend.get_game(&game_id).await.unwrap().unwrap();
        assert_eq!(game.phase, GamePhase::Reveal);
        assert_eq!(session.state().await.phase, ViewPhase::Reveal);
    }

    #[tokio::test]
    async fn test_host_pushes_timer_on_sync_interval() {
        let backend = Arc::new(MemoryBackend::new());
        let session = session_with_user(&backend, "Alice").await;
        let code = session.create_game(6, 300).await.unwrap();
        let game_id = backend
            .find_game_by_code(&code)
            .await
            .unwrap()
            .unwrap()
            .id;

        session.create_persona(persona("The Professor")).await.unwrap();
        session.start_game().await.unwrap();
        settle().await;

        backend.update_game_timer(&game_id, 30).await.unwrap();
        settle().await;

        // 30 is on the sync boundary: the host pushes 29
        session.tick().await;
        let game = backend.get_game(&game_id).await.unwrap().unwrap();
        assert_eq!(game.time_remaining, 29);

        // 29 is not: the local value drifts ahead of the backend
        session.tick().await;
        let game = backend.get_game(&game_id).await.unwrap().unwrap();
        assert_eq!(game.time_remaining, 29);
        settle().await;
        assert_eq!(session.state().await.time_remaining, 28);
    }

    #[tokio::test]
    async fn test_leave_game_resets_local_state_idempotently() {
        let backend = Arc::new(MemoryBackend::new());
        let session = session_with_user(&backend, "Alice").await;
        let code = session.create_game(6, 300).await.unwrap();
        session.create_persona(persona("Ghostwriter")).await.unwrap();
        settle().await;

        session.leave_game().await.unwrap();
        let state = session.state().await;
        assert_eq!(state.phase, ViewPhase::Home);
        assert!(state.game_id.is_none());
        assert!(state.players.is_empty());
        assert!(state.messages.is_empty());
        assert!(state.votes.is_empty());

        // Second leave has nothing to remove and still succeeds
        session.leave_game().await.unwrap();
        assert_eq!(session.state().await.phase, ViewPhase::Home);

        let game = backend.find_game_by_code(&code).await.unwrap().unwrap();
        assert_eq!(game.current_players, 0);
    }

    #[tokio::test]
    async fn test_set_phase_override_for_static_screens() {
        let backend = Arc::new(MemoryBackend::new());
        let session = session_with_user(&backend, "Alice").await;

        session.set_phase(ViewPhase::About).await;
        assert_eq!(session.state().await.phase, ViewPhase::About);
        session.set_phase(ViewPhase::Home).await;
        assert_eq!(session.state().await.phase, ViewPhase::Home);
    }
}
