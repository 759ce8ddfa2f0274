use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{
        CreateGameRequest, GameSnapshot, HostActionRequest, JoinGameRequest,
        PlayerSessionResponse,
    },
    dto::grid::{MarkSongRequest, MarkSongResponse},
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Routes handling the game lifecycle and global marks.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", post(create_game))
        .route("/games/{code}", get(get_game))
        .route("/games/{code}/players", post(join_game))
        .route("/games/{code}/players/{player_id}", delete(remove_player))
        .route("/games/{code}/start", post(start_game))
        .route("/games/{code}/finish", post(finish_game))
        .route("/games/{code}/marks", post(mark_song))
}

/// Open a new lobby; the caller becomes host.
#[utoipa::path(
    post,
    path = "/games",
    tag = "game",
    request_body = CreateGameRequest,
    responses(
        (status = 200, description = "Game created", body = PlayerSessionResponse),
        (status = 400, description = "Invalid payload"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateGameRequest>>,
) -> Result<Json<PlayerSessionResponse>, AppError> {
    let session = game_service::create_game(&state, payload).await?;
    Ok(Json(session))
}

#[utoipa::path(
    get,
    path = "/games/{code}",
    tag = "game",
    params(("code" = String, Path, description = "Invite code of the game")),
    responses(
        (status = 200, description = "Current snapshot", body = GameSnapshot),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<GameSnapshot>, AppError> {
    let snapshot = game_service::get_game(&state, &code).await?;
    Ok(Json(snapshot))
}

/// Join a game through its invite code.
#[utoipa::path(
    post,
    path = "/games/{code}/players",
    tag = "game",
    params(("code" = String, Path, description = "Invite code of the game")),
    request_body = JoinGameRequest,
    responses(
        (status = 200, description = "Player joined", body = PlayerSessionResponse),
        (status = 404, description = "Unknown game"),
        (status = 409, description = "Game no longer accepts players")
    )
)]
pub async fn join_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<JoinGameRequest>>,
) -> Result<Json<PlayerSessionResponse>, AppError> {
    let session = game_service::join_game(&state, &code, payload).await?;
    Ok(Json(session))
}

/// Delete a player; the host cannot leave their own game.
#[utoipa::path(
    delete,
    path = "/games/{code}/players/{player_id}",
    tag = "game",
    params(
        ("code" = String, Path, description = "Invite code of the game"),
        ("player_id" = Uuid, Path, description = "Player to remove")
    ),
    responses(
        (status = 200, description = "Player removed", body = GameSnapshot),
        (status = 404, description = "Unknown game or player"),
        (status = 409, description = "Player cannot be removed")
    )
)]
pub async fn remove_player(
    State(state): State<SharedState>,
    Path((code, player_id)): Path<(String, Uuid)>,
) -> Result<Json<GameSnapshot>, AppError> {
    let snapshot = game_service::remove_player(&state, &code, player_id).await?;
    Ok(Json(snapshot))
}

#[utoipa::path(
    post,
    path = "/games/{code}/start",
    tag = "game",
    params(("code" = String, Path, description = "Invite code of the game")),
    request_body = HostActionRequest,
    responses(
        (status = 200, description = "Game started", body = GameSnapshot),
        (status = 403, description = "Caller is not the host"),
        (status = 409, description = "Game is not in the lobby")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<HostActionRequest>,
) -> Result<Json<GameSnapshot>, AppError> {
    let snapshot = game_service::start_game(&state, &code, payload.player_id).await?;
    Ok(Json(snapshot))
}

#[utoipa::path(
    post,
    path = "/games/{code}/finish",
    tag = "game",
    params(("code" = String, Path, description = "Invite code of the game")),
    request_body = HostActionRequest,
    responses(
        (status = 200, description = "Game finished", body = GameSnapshot),
        (status = 403, description = "Caller is not the host"),
        (status = 409, description = "Game already finished")
    )
)]
pub async fn finish_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<HostActionRequest>,
) -> Result<Json<GameSnapshot>, AppError> {
    let snapshot = game_service::finish_game(&state, &code, payload.player_id).await?;
    Ok(Json(snapshot))
}

/// Mark or unmark a song on every grid of the game.
#[utoipa::path(
    post,
    path = "/games/{code}/marks",
    tag = "game",
    params(("code" = String, Path, description = "Invite code of the game")),
    request_body = MarkSongRequest,
    responses(
        (status = 200, description = "Mark applied (or already in place)", body = MarkSongResponse),
        (status = 404, description = "Unknown game or player"),
        (status = 409, description = "Game is not running")
    )
)]
pub async fn mark_song(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<MarkSongRequest>>,
) -> Result<Json<MarkSongResponse>, AppError> {
    let response = game_service::mark_song(&state, &code, payload).await?;
    Ok(Json(response))
}
