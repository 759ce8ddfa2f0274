use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        game::GameSnapshot,
        grid::{AssignSongRequest, ClearCellRequest, SwapCellsRequest},
    },
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Routes editing a single player's grid.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games/{code}/players/{player_id}/grid/swap", post(swap_cells))
        .route("/games/{code}/players/{player_id}/grid/assign", post(assign_song))
        .route("/games/{code}/players/{player_id}/grid/clear", post(clear_cell))
}

/// Exchange two cells while the game is in the lobby.
#[utoipa::path(
    post,
    path = "/games/{code}/players/{player_id}/grid/swap",
    tag = "grid",
    params(
        ("code" = String, Path, description = "Invite code of the game"),
        ("player_id" = Uuid, Path, description = "Owner of the grid")
    ),
    request_body = SwapCellsRequest,
    responses(
        (status = 200, description = "Cells swapped", body = GameSnapshot),
        (status = 400, description = "Cell index out of range"),
        (status = 409, description = "Game already started")
    )
)]
pub async fn swap_cells(
    State(state): State<SharedState>,
    Path((code, player_id)): Path<(String, Uuid)>,
    Valid(Json(payload)): Valid<Json<SwapCellsRequest>>,
) -> Result<Json<GameSnapshot>, AppError> {
    let snapshot = game_service::swap_cells(&state, &code, player_id, payload).await?;
    Ok(Json(snapshot))
}

#[utoipa::path(
    post,
    path = "/games/{code}/players/{player_id}/grid/assign",
    tag = "grid",
    params(
        ("code" = String, Path, description = "Invite code of the game"),
        ("player_id" = Uuid, Path, description = "Owner of the grid")
    ),
    request_body = AssignSongRequest,
    responses(
        (status = 200, description = "Song placed", body = GameSnapshot),
        (status = 404, description = "Unknown game, player or cell"),
        (status = 409, description = "Cell occupied or song already used")
    )
)]
pub async fn assign_song(
    State(state): State<SharedState>,
    Path((code, player_id)): Path<(String, Uuid)>,
    Valid(Json(payload)): Valid<Json<AssignSongRequest>>,
) -> Result<Json<GameSnapshot>, AppError> {
    let snapshot = game_service::assign_song(&state, &code, player_id, payload).await?;
    Ok(Json(snapshot))
}

#[utoipa::path(
    post,
    path = "/games/{code}/players/{player_id}/grid/clear",
    tag = "grid",
    params(
        ("code" = String, Path, description = "Invite code of the game"),
        ("player_id" = Uuid, Path, description = "Owner of the grid")
    ),
    request_body = ClearCellRequest,
    responses(
        (status = 200, description = "Cell emptied", body = GameSnapshot),
        (status = 404, description = "Unknown game, player or cell")
    )
)]
pub async fn clear_cell(
    State(state): State<SharedState>,
    Path((code, player_id)): Path<(String, Uuid)>,
    Valid(Json(payload)): Valid<Json<ClearCellRequest>>,
) -> Result<Json<GameSnapshot>, AppError> {
    let snapshot = game_service::clear_cell(&state, &code, player_id, payload).await?;
    Ok(Json(snapshot))
}
