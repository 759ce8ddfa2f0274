use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/games/{code}",
    tag = "sse",
    params(("code" = String, Path, description = "Invite code of the game")),
    responses(
        (
            status = 200,
            description = "Game SSE stream",
            content_type = "text/event-stream",
            body = String
        ),
        (status = 404, description = "Unknown game")
    )
)]
/// Stream the authoritative snapshots of one game.
pub async fn game_stream(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = sse_service::subscribe_game(&state, &code).await?;
    info!(code = %subscription.code, "new game SSE connection");
    Ok(sse_service::to_sse_stream(state, subscription))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/games/{code}", get(game_stream))
}
