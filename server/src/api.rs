use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use common::games::connect_four::{COLUMNS, Move, ROWS, party_to_proto};
use common::{PlayerId, SessionId, log};

use crate::server_config::MAX_PAGE_SIZE;
use crate::store::{GameRecord, GameRecordStatus, GameStore, LeaderboardPage, PlayerStats};
use crate::web_server::WebServerState;

/// Raw query values; anything unparsable falls back to the default, as the web client expects.
#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Serialize)]
struct LeaderboardResponse {
    success: bool,
    #[serde(flatten)]
    page: LeaderboardPage,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlayerView {
    username: String,
    wins: u32,
    losses: u32,
    draws: u32,
    total_games: u32,
    win_percentage: f64,
}

#[derive(Serialize)]
struct PlayerResponse {
    success: bool,
    player: PlayerView,
}

#[derive(Serialize)]
struct GameView {
    session_id: String,
    party_a: String,
    party_b: String,
    board: Vec<Vec<u32>>,
    moves: Vec<Move>,
    next_to_move: u32,
    status: GameRecordStatus,
    winner: Option<String>,
    is_draw: bool,
}

#[derive(Serialize)]
struct GameResponse {
    success: bool,
    game: GameView,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

fn error_response(status: StatusCode, error: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn parse_positive(value: Option<&str>) -> Option<usize> {
    value.and_then(|raw| raw.trim().parse::<usize>().ok()).filter(|&n| n > 0)
}

pub async fn leaderboard(
    State(state): State<WebServerState>,
    Query(query): Query<LeaderboardQuery>,
) -> Response {
    let page = parse_positive(query.page.as_deref()).unwrap_or(1);
    let limit = parse_positive(query.limit.as_deref())
        .unwrap_or(state.default_page_size)
        .min(MAX_PAGE_SIZE);

    match state.store.leaderboard(page, limit).await {
        Ok(page) => Json(LeaderboardResponse { success: true, page }).into_response(),
        Err(e) => {
            log!("Failed to get leaderboard: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get leaderboard")
        }
    }
}

pub async fn player_stats(
    State(state): State<WebServerState>,
    Path(username): Path<String>,
) -> Response {
    match state.store.player_stats(&PlayerId::new(username.clone())).await {
        Ok(Some(stats)) => Json(PlayerResponse {
            success: true,
            player: player_view(username, stats),
        })
        .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Player not found"),
        Err(e) => {
            log!("Failed to get stats for {}: {}", username, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get player stats")
        }
    }
}

pub async fn game_record(
    State(state): State<WebServerState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.store.game(&SessionId::new(session_id.clone())).await {
        Ok(Some(record)) => Json(GameResponse {
            success: true,
            game: game_view(record),
        })
        .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Game not found"),
        Err(e) => {
            log!("[session:{}] Failed to load game record: {}", session_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get game")
        }
    }
}

fn player_view(username: String, stats: PlayerStats) -> PlayerView {
    PlayerView {
        username,
        wins: stats.wins,
        losses: stats.losses,
        draws: stats.draws,
        total_games: stats.total_games(),
        win_percentage: stats.win_percentage(),
    }
}

fn game_view(record: GameRecord) -> GameView {
    let board = (0..ROWS)
        .map(|row| {
            (0..COLUMNS)
                .map(|column| party_to_proto(record.board.get(row, column)))
                .collect()
        })
        .collect();

    GameView {
        session_id: record.session_id.to_string(),
        party_a: record.party_a,
        party_b: record.party_b,
        board,
        moves: record.moves,
        next_to_move: record.next_to_move.to_proto(),
        status: record.status,
        winner: record.winner,
        is_draw: record.is_draw,
    }
}
