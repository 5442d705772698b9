//! HTTP API endpoints.
//!
//! The small REST surface next to the WebSocket: persona submission, vote
//! submission and the score tally.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::GameError;
use crate::server::ServerState;
use crate::store::Backend;
use crate::types::*;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePersonaRequest {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub persona: Persona,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVoteRequest {
    pub game_id: GameId,
    pub voter_id: PlayerId,
    pub target_id: PlayerId,
    pub guess: String,
    pub round: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreQuery {
    pub game_id: GameId,
    pub round: Option<u32>,
}

/// One row of the score tally: how often each player was voted for.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub player_id: PlayerId,
    pub player_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona_name: Option<String>,
    pub votes_received: u32,
}

/// Store a player's persona and announce it in chat.
///
/// POST /api/persona
pub async fn create_persona(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<CreatePersonaRequest>,
) -> Response {
    let announcement = format!("{} joined the game!", req.persona.name);
    match state
        .backend
        .update_player_persona(&req.game_id, &req.player_id, req.persona)
        .await
    {
        Ok(()) => {
            if let Err(err) = state
                .backend
                .send_system_message(&req.game_id, &announcement)
                .await
            {
                tracing::warn!(%err, "failed to store persona announcement");
            }
            StatusCode::CREATED.into_response()
        }
        Err(err) => error_response(err),
    }
}

/// Record a vote.
///
/// POST /api/vote
pub async fn submit_vote(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<SubmitVoteRequest>,
) -> Response {
    match state
        .backend
        .submit_vote(
            &req.game_id,
            &req.voter_id,
            &req.target_id,
            &req.guess,
            req.round,
        )
        .await
    {
        Ok(vote) => (StatusCode::CREATED, Json(vote)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Vote tally for a game, optionally restricted to one round.
///
/// GET /api/score?gameId=...
pub async fn scores(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ScoreQuery>,
) -> Response {
    match tally_scores(state.backend.as_ref(), &query.game_id, query.round).await {
        Ok(entries) => Json(entries).into_response(),
        Err(err) => error_response(err),
    }
}

/// Count the votes each player received. Every player appears in the result,
/// with zero when nobody voted for them; ordered by votes descending, name
/// as tie-breaker.
pub async fn tally_scores<B: Backend + ?Sized>(
    backend: &B,
    game_id: &GameId,
    round: Option<u32>,
) -> Result<Vec<ScoreEntry>, GameError> {
    if backend.get_game(game_id).await?.is_none() {
        return Err(GameError::NotFound);
    }
    let players = backend.list_players(game_id).await?;
    let votes = backend.list_votes(game_id, round).await?;

    let mut received: HashMap<&str, u32> = HashMap::new();
    for vote in &votes {
        *received.entry(vote.target_id.as_str()).or_default() += 1;
    }

    let mut entries: Vec<ScoreEntry> = players
        .iter()
        .map(|player| ScoreEntry {
            player_id: player.player_id.clone(),
            player_name: player.player_name.clone(),
            persona_name: player.persona.as_ref().map(|p| p.name.clone()),
            votes_received: received
                .get(player.player_id.as_str())
                .copied()
                .unwrap_or(0),
        })
        .collect();
    entries.sort_by(|a, b| {
        b.votes_received
            .cmp(&a.votes_received)
            .then_with(|| a.player_name.cmp(&b.player_name))
    });
    Ok(entries)
}

fn error_response(err: GameError) -> Response {
    let status = match err {
        GameError::NotFound => StatusCode::NOT_FOUND,
        GameError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    tracing::warn!(%err, %status, "api request failed");
    (status, err.user_message()).into_response()
}
