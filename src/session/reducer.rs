//! Pure view-state reducer.
//!
//! Every change to the session's render-ready state goes through
//! [`apply`]: a closed set of events, each merging into only the slice of
//! state it owns. The three backend subscriptions, the countdown and the
//! user-triggered operations all produce events; none of them mutate the
//! state directly. This keeps every transition testable without a backend.

use serde::Serialize;

use crate::error::GameError;
use crate::types::*;

/// Settings snapshot as the views consume it (game settings plus the
/// capacity field that lives on the game document itself).
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ViewSettings {
    pub max_players: u32,
    pub round_duration: u32,
    pub voting_duration: u32,
    pub min_players: u32,
    pub max_rounds: u32,
}

impl ViewSettings {
    pub fn from_game(game: &Game) -> Self {
        Self {
            max_players: game.max_players,
            round_duration: game.settings.round_duration,
            voting_duration: game.settings.voting_duration,
            min_players: game.settings.min_players,
            max_rounds: game.settings.max_rounds,
        }
    }
}

/// The caller's own slice of the player list, kept even while no snapshot
/// has arrived yet.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPlayer {
    pub id: UserId,
    pub username: String,
    pub score: u32,
    pub is_ready: bool,
    pub persona: Option<Persona>,
}

/// Unified, render-ready state. One instance per session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub phase: ViewPhase,
    pub game_code: Option<String>,
    pub game_id: Option<GameId>,
    pub is_host: bool,
    pub round: u32,
    pub time_remaining: u32,
    pub settings: Option<ViewSettings>,
    pub players: Vec<Player>,
    pub current_player: CurrentPlayer,
    pub messages: Vec<ChatMessage>,
    pub votes: Vec<Vote>,
    /// Single error slot feeding the banner
    pub error: Option<String>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            phase: ViewPhase::Home,
            game_code: None,
            game_id: None,
            is_host: false,
            round: 1,
            time_remaining: GameSettings::default().round_duration,
            settings: None,
            players: Vec::new(),
            current_player: CurrentPlayer::default(),
            messages: Vec::new(),
            votes: Vec::new(),
            error: None,
        }
    }
}

/// Closed set of state transitions.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The auth collaborator produced an account
    SignedIn { uid: UserId, username: String },
    GameCreated {
        game_id: GameId,
        game_code: String,
        settings: ViewSettings,
    },
    GameJoined {
        game_id: GameId,
        game_code: String,
        settings: ViewSettings,
    },
    /// Game-document snapshot from the backend subscription
    GameChanged(Game),
    /// Player-set snapshot from the backend subscription
    PlayersChanged(Vec<Player>),
    /// Message-set snapshot from the backend subscription
    MessagesChanged(Vec<ChatMessage>),
    PersonaCreated(Persona),
    VoteSubmitted(Vote),
    /// One local countdown second
    Tick,
    /// Direct phase override (static screens)
    PhaseSet(ViewPhase),
    Failed(GameError),
    ErrorCleared,
    Left,
}

/// Fold one event into the state. Each arm touches only the fields the event
/// owns, so snapshots from independent subscriptions cannot clobber each
/// other (last-write-wins per slice).
pub fn apply(state: &mut ViewState, event: SessionEvent) {
    match event {
        SessionEvent::SignedIn { uid, username } => {
            state.current_player.id = uid;
            state.current_player.username = username;
        }
        SessionEvent::GameCreated {
            game_id,
            game_code,
            settings,
        } => {
            state.game_id = Some(game_id);
            state.game_code = Some(game_code);
            state.is_host = true;
            state.round = 1;
            state.time_remaining = settings.round_duration;
            state.settings = Some(settings);
            state.phase = ViewPhase::CreatePersona;
            state.error = None;
        }
        SessionEvent::GameJoined {
            game_id,
            game_code,
            settings,
        } => {
            state.game_id = Some(game_id);
            state.game_code = Some(game_code);
            state.is_host = false;
            state.settings = Some(settings);
            state.phase = ViewPhase::CreatePersona;
            state.error = None;
        }
        SessionEvent::GameChanged(game) => {
            // Hold the local phase while the backend still says `waiting`:
            // the remote record exists before this player finished creating
            // a persona, and must not yank the screen away early.
            if game.phase != GamePhase::Waiting {
                state.phase = game.phase.into();
            }
            state.time_remaining = game.time_remaining;
            state.round = game.round;
            state.settings = Some(ViewSettings::from_game(&game));
        }
        SessionEvent::PlayersChanged(players) => {
            if let Some(me) = players
                .iter()
                .find(|p| p.player_id == state.current_player.id)
            {
                state.current_player.score = me.score;
                state.current_player.is_ready = me.is_ready;
                state.current_player.persona = me.persona.clone();
            }
            state.players = players;
        }
        SessionEvent::MessagesChanged(messages) => {
            state.messages = messages;
        }
        SessionEvent::PersonaCreated(persona) => {
            state.current_player.persona = Some(persona);
            state.current_player.is_ready = true;
            state.phase = ViewPhase::Waiting;
        }
        SessionEvent::VoteSubmitted(vote) => {
            state.votes.push(vote);
            // Per-caller jump: the voter sees the reveal screen immediately,
            // without waiting for the other players' votes.
            state.phase = ViewPhase::Reveal;
        }
        SessionEvent::Tick => {
            if matches!(state.phase, ViewPhase::Playing | ViewPhase::Voting) {
                state.time_remaining = state.time_remaining.saturating_sub(1);
            }
        }
        SessionEvent::PhaseSet(phase) => {
            state.phase = phase;
            state.error = None;
        }
        SessionEvent::Failed(err) => {
            state.error = Some(err.user_message());
        }
        SessionEvent::ErrorCleared => {
            state.error = None;
        }
        SessionEvent::Left => {
            state.game_id = None;
            state.game_code = None;
            state.is_host = false;
            state.players.clear();
            state.messages.clear();
            state.votes.clear();
            state.phase = ViewPhase::Home;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game_snapshot(phase: GamePhase, time_remaining: u32) -> Game {
        let now = chrono::Utc::now().to_rfc3339();
        Game {
            id: "g1".to_string(),
            game_code: "ABC123".to_string(),
            host_id: "host".to_string(),
            host_name: "Host".to_string(),
            phase,
            round: 1,
            max_players: 6,
            current_players: 2,
            time_remaining,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
            settings: GameSettings::default(),
        }
    }

    fn settings() -> ViewSettings {
        ViewSettings::from_game(&game_snapshot(GamePhase::Waiting, 300))
    }

    #[test]
    fn test_remote_waiting_phase_does_not_override_local() {
        let mut state = ViewState::default();
        apply(
            &mut state,
            SessionEvent::GameCreated {
                game_id: "g1".to_string(),
                game_code: "ABC123".to_string(),
                settings: settings(),
            },
        );
        assert_eq!(state.phase, ViewPhase::CreatePersona);

        // Remote snapshot still in waiting arrives before the persona is done
        apply(
            &mut state,
            SessionEvent::GameChanged(game_snapshot(GamePhase::Waiting, 300)),
        );
        assert_eq!(state.phase, ViewPhase::CreatePersona);

        // A real phase advance does pass through
        apply(
            &mut state,
            SessionEvent::GameChanged(game_snapshot(GamePhase::Playing, 300)),
        );
        assert_eq!(state.phase, ViewPhase::Playing);
    }

    #[test]
    fn test_game_snapshot_updates_timer_and_round_slices_only() {
        let mut state = ViewState::default();
        state.messages.push(ChatMessage {
            id: "m1".to_string(),
            game_id: "g1".to_string(),
            player_id: "p1".to_string(),
            player_name: "Zora".to_string(),
            message: "hi".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            is_system_message: false,
        });

        apply(
            &mut state,
            SessionEvent::GameChanged(game_snapshot(GamePhase::Playing, 42)),
        );
        assert_eq!(state.time_remaining, 42);
        // The message slice is owned by a different subscription
        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn test_players_snapshot_refreshes_current_player() {
        let mut state = ViewState::default();
        apply(
            &mut state,
            SessionEvent::SignedIn {
                uid: "u1".to_string(),
                username: "Alice".to_string(),
            },
        );

        let persona = Persona {
            name: "Dr. Marbles".to_string(),
            age: "52".to_string(),
            profession: "Marble archivist".to_string(),
            traits: "meticulous".to_string(),
            backstory: None,
            hobbies: None,
            quirks: None,
        };
        let me = Player {
            id: "doc1".to_string(),
            game_id: "g1".to_string(),
            player_id: "u1".to_string(),
            player_name: "Alice".to_string(),
            is_ready: true,
            is_connected: true,
            score: 30,
            persona: Some(persona.clone()),
            joined_at: String::new(),
            last_seen: String::new(),
        };
        apply(&mut state, SessionEvent::PlayersChanged(vec![me]));

        assert_eq!(state.current_player.score, 30);
        assert!(state.current_player.is_ready);
        assert_eq!(state.current_player.persona, Some(persona));
    }

    #[test]
    fn test_tick_only_counts_down_in_timed_phases() {
        let mut state = ViewState::default();
        state.time_remaining = 2;

        apply(&mut state, SessionEvent::Tick);
        assert_eq!(state.time_remaining, 2, "home phase must not tick");

        state.phase = ViewPhase::Playing;
        apply(&mut state, SessionEvent::Tick);
        apply(&mut state, SessionEvent::Tick);
        apply(&mut state, SessionEvent::Tick);
        assert_eq!(state.time_remaining, 0, "saturates at zero");
    }

    #[test]
    fn test_vote_submission_jumps_to_reveal() {
        let mut state = ViewState::default();
        state.phase = ViewPhase::Voting;

        let vote = Vote {
            id: "v1".to_string(),
            game_id: "g1".to_string(),
            voter_id: "u1".to_string(),
            target_id: "u2".to_string(),
            guess: "an undercover baker".to_string(),
            round: 1,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        apply(&mut state, SessionEvent::VoteSubmitted(vote));

        assert_eq!(state.votes.len(), 1);
        assert_eq!(state.phase, ViewPhase::Reveal);
    }

    #[test]
    fn test_left_resets_game_slices_and_keeps_identity() {
        let mut state = ViewState::default();
        apply(
            &mut state,
            SessionEvent::SignedIn {
                uid: "u1".to_string(),
                username: "Alice".to_string(),
            },
        );
        apply(
            &mut state,
            SessionEvent::GameCreated {
                game_id: "g1".to_string(),
                game_code: "ABC123".to_string(),
                settings: settings(),
            },
        );

        apply(&mut state, SessionEvent::Left);
        assert_eq!(state.phase, ViewPhase::Home);
        assert!(state.game_id.is_none());
        assert!(state.players.is_empty());
        assert!(state.messages.is_empty());
        assert!(state.votes.is_empty());
        assert_eq!(state.current_player.username, "Alice");

        // Applying Left twice is harmless
        apply(&mut state, SessionEvent::Left);
        assert_eq!(state.phase, ViewPhase::Home);
    }

    #[test]
    fn test_failed_fills_error_slot_and_phase_set_clears_it() {
        let mut state = ViewState::default();
        apply(&mut state, SessionEvent::Failed(GameError::Full));
        assert_eq!(state.error.as_deref(), Some("This game is full"));

        apply(&mut state, SessionEvent::PhaseSet(ViewPhase::About));
        assert_eq!(state.phase, ViewPhase::About);
        assert!(state.error.is_none());
    }
}
