use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::game::{GameSnapshot, MarkReportDto},
    state::grid::{Song, SongId},
};

/// Exchange the contents of two cells, addressed by row-major index.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SwapCellsRequest {
    pub a: usize,
    pub b: usize,
}

/// Song picked from the search provider.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SongInput {
    /// Provider id; numbers are accepted and kept as their decimal form.
    #[schema(value_type = String)]
    pub id: SongId,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 200))]
    pub artist: String,
    #[validate(url)]
    pub cover: String,
    #[validate(url)]
    #[serde(default)]
    pub preview: Option<String>,
}

impl From<SongInput> for Song {
    fn from(value: SongInput) -> Self {
        Self {
            id: value.id,
            title: value.title,
            artist: value.artist,
            cover: value.cover,
            preview: value.preview,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AssignSongRequest {
    #[validate(length(min = 1))]
    pub cell_id: String,
    #[validate(nested)]
    pub song: SongInput,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ClearCellRequest {
    #[validate(length(min = 1))]
    pub cell_id: String,
}

/// Mark or unmark a song on every grid of the game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct MarkSongRequest {
    /// Player issuing the mark; must belong to the game.
    pub player_id: Uuid,
    #[schema(value_type = String)]
    pub song_id: SongId,
    #[serde(default = "default_marked")]
    pub marked: bool,
}

fn default_marked() -> bool {
    true
}

/// Result of a mark command.
#[derive(Debug, Serialize, ToSchema)]
pub struct MarkSongResponse {
    /// False when every matching cell already had the requested state.
    pub changed: bool,
    pub players: Vec<MarkReportDto>,
    pub game: GameSnapshot,
}

/// Fresh preview URL for a song, replacing an expired upstream link.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PreviewUpdateRequest {
    /// `null` forgets the cached URL.
    #[validate(url)]
    pub preview: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PreviewUpdateResponse {
    pub song_id: String,
    pub preview: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_song_ids_are_accepted() {
        let request: MarkSongRequest = serde_json::from_str(
            r#"{ "player_id": "00000000-0000-0000-0000-000000000000", "song_id": 3135556 }"#,
        )
        .unwrap();
        assert_eq!(request.song_id, SongId::from("3135556"));
        assert!(request.marked);
    }

    #[test]
    fn assign_request_checks_song_urls() {
        let request: AssignSongRequest = serde_json::from_str(
            r#"{
                "cell_id": "cell-3",
                "song": { "id": "a", "title": "T", "artist": "A", "cover": "not a url" }
            }"#,
        )
        .unwrap();
        assert!(request.validate().is_err());

        let request: AssignSongRequest = serde_json::from_str(
            r#"{
                "cell_id": "cell-3",
                "song": {
                    "id": 7, "title": "T", "artist": "A",
                    "cover": "https://covers.example/7.jpg",
                    "preview": "https://cdn.example/7.mp3"
                }
            }"#,
        )
        .unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(Song::from(request.song).id, SongId::from(7u64));
    }
}
