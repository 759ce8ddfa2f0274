use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Persisted lifecycle status of a game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameStatusEntity {
    Lobby,
    Playing,
    Finished,
}

/// Options chosen by the host when the game was created.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSettingsEntity {
    /// Whether a song may appear at most once across every grid.
    pub no_duplicates: bool,
    /// Whether players may join while the game is running.
    pub allow_late_join: bool,
    /// Side length of every grid.
    pub grid_size: u32,
}

/// Song stored inside a grid cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SongEntity {
    /// Provider identifier, kept in its textual form.
    pub id: String,
    pub title: String,
    pub artist: String,
    /// Cover art URL.
    pub cover: String,
    /// Audio preview URL at the time the song was picked.
    pub preview: Option<String>,
}

/// One cell of a player's grid, stored in row-major order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CellEntity {
    /// Position-bound identifier (`cell-<index>`).
    pub id: String,
    pub song: Option<SongEntity>,
    pub marked: bool,
}

/// Representation of a player stored in persistence and shared across layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Stable identifier for the player.
    pub id: Uuid,
    /// Display name chosen for the player.
    pub name: String,
    /// Optional avatar (emoji or URL).
    pub avatar: Option<String>,
    /// Points earned so far; never decreases.
    pub score: u32,
    /// Highest number of simultaneously completed lines observed.
    pub bingo_count: u32,
    /// Grid cells in row-major order.
    pub cells: Vec<CellEntity>,
}

/// Aggregate game entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game: the 6-character join code.
    pub code: String,
    /// Player that created the game and drives its lifecycle.
    pub host_id: Uuid,
    pub status: GameStatusEntity,
    pub settings: GameSettingsEntity,
    /// Players in join order.
    pub players: Vec<PlayerEntity>,
    /// Creation timestamp, used for expiry.
    pub created_at: SystemTime,
    /// Last time the game entity was updated.
    pub updated_at: SystemTime,
    /// Optimistic concurrency token, incremented on every write.
    pub version: u64,
}

/// Aggregate game list item entity (subset of GameEntity) persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameListItemEntity {
    pub code: String,
    pub status: GameStatusEntity,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    /// Number of players currently in the game.
    pub player_count: usize,
}

impl From<&GameEntity> for GameListItemEntity {
    fn from(entity: &GameEntity) -> Self {
        Self {
            code: entity.code.clone(),
            status: entity.status,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
            player_count: entity.players.len(),
        }
    }
}
