use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for the music bingo backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::game_stream,
        crate::routes::game::create_game,
        crate::routes::game::get_game,
        crate::routes::game::join_game,
        crate::routes::game::remove_player,
        crate::routes::game::start_game,
        crate::routes::game::finish_game,
        crate::routes::game::mark_song,
        crate::routes::grid::swap_cells,
        crate::routes::grid::assign_song,
        crate::routes::grid::clear_cell,
        crate::routes::songs::update_preview,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::JoinGameRequest,
            crate::dto::game::HostActionRequest,
            crate::dto::game::PlayerSessionResponse,
            crate::dto::game::GameSnapshot,
            crate::dto::game::GameSettingsDto,
            crate::dto::game::PlayerSnapshot,
            crate::dto::game::CellSnapshot,
            crate::dto::game::SongSnapshot,
            crate::dto::game::LineDto,
            crate::dto::game::MarkReportDto,
            crate::dto::grid::SwapCellsRequest,
            crate::dto::grid::SongInput,
            crate::dto::grid::AssignSongRequest,
            crate::dto::grid::ClearCellRequest,
            crate::dto::grid::MarkSongRequest,
            crate::dto::grid::MarkSongResponse,
            crate::dto::grid::PreviewUpdateRequest,
            crate::dto::grid::PreviewUpdateResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::SongMarkedEvent,
            crate::state::state_machine::GameStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Game lifecycle and global marks"),
        (name = "grid", description = "Per-player grid editing"),
        (name = "songs", description = "Song metadata side channel"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
