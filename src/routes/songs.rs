use axum::{
    Json, Router,
    extract::{Path, State},
    routing::put,
};
use axum_valid::Valid;

use crate::{
    dto::grid::{PreviewUpdateRequest, PreviewUpdateResponse},
    error::AppError,
    services::game_service,
    state::SharedState,
};

pub fn router() -> Router<SharedState> {
    Router::new().route("/songs/{song_id}/preview", put(update_preview))
}

/// Replace the expired preview URL of a song in every snapshot.
#[utoipa::path(
    put,
    path = "/songs/{song_id}/preview",
    tag = "songs",
    params(("song_id" = String, Path, description = "Provider id of the song")),
    request_body = PreviewUpdateRequest,
    responses(
        (status = 200, description = "Preview stored", body = PreviewUpdateResponse),
        (status = 400, description = "Invalid URL")
    )
)]
pub async fn update_preview(
    State(state): State<SharedState>,
    Path(song_id): Path<String>,
    Valid(Json(payload)): Valid<Json<PreviewUpdateRequest>>,
) -> Result<Json<PreviewUpdateResponse>, AppError> {
    let response = game_service::refresh_preview(&state, &song_id, payload)?;
    Ok(Json(response))
}
