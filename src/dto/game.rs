use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dto::{
        format_system_time,
        validation::{validate_display_name, validate_grid_size},
    },
    state::{
        game::{Game, GameSettings, Player, PlayerMarkReport},
        grid::{Cell, Song, SongId},
        lines::Line,
        scoring::ScoringRules,
        state_machine::GameStatus,
    },
};

const MAX_NAME_LENGTH: usize = 40;
const MAX_AVATAR_LENGTH: usize = 512;

/// Payload used to open a new game; the caller becomes its host.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateGameRequest {
    pub host_name: String,
    /// Emoji or image URL.
    #[serde(default)]
    pub host_avatar: Option<String>,
    #[serde(default)]
    pub no_duplicates: bool,
    #[serde(default)]
    pub allow_late_join: bool,
    /// Side length of every grid; defaults to the configured size.
    #[serde(default)]
    pub grid_size: Option<usize>,
}

impl Validate for CreateGameRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_player_fields(&self.host_name, self.host_avatar.as_deref()) {
            for (field, error) in e {
                let field = if field == "name" { "host_name" } else { "host_avatar" };
                errors.add(field, error);
            }
        }

        if let Some(size) = self.grid_size {
            if let Err(e) = validate_grid_size(size) {
                errors.add("grid_size", e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Payload sent by a player joining through the invite code.
#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinGameRequest {
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Validate for JoinGameRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_player_fields(&self.name, self.avatar.as_deref()) {
            for (field, error) in e {
                errors.add(field, error);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Shared checks for a player's name and avatar, keyed by `name` / `avatar`.
fn validate_player_fields(
    name: &str,
    avatar: Option<&str>,
) -> Result<(), Vec<(&'static str, ValidationError)>> {
    let mut failures = Vec::new();

    if name.chars().count() > MAX_NAME_LENGTH {
        let mut err = ValidationError::new("length");
        err.message = Some(format!("Name must be at most {MAX_NAME_LENGTH} characters").into());
        failures.push(("name", err));
    } else if let Err(e) = validate_display_name(name) {
        failures.push(("name", e));
    }

    if avatar.is_some_and(|avatar| avatar.len() > MAX_AVATAR_LENGTH) {
        let mut err = ValidationError::new("length");
        err.message = Some(format!("Avatar must be at most {MAX_AVATAR_LENGTH} bytes").into());
        failures.push(("avatar", err));
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}

/// Identifies the host for lifecycle actions.
#[derive(Debug, Deserialize, ToSchema)]
pub struct HostActionRequest {
    pub player_id: Uuid,
}

/// Returned when a player enters a game (creation or join).
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerSessionResponse {
    pub player_id: Uuid,
    pub game: GameSnapshot,
}

/// Settings echoed back to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameSettingsDto {
    pub no_duplicates: bool,
    pub allow_late_join: bool,
    pub grid_size: usize,
}

impl From<GameSettings> for GameSettingsDto {
    fn from(value: GameSettings) -> Self {
        Self {
            no_duplicates: value.no_duplicates,
            allow_late_join: value.allow_late_join,
            grid_size: value.grid_size,
        }
    }
}

/// Full authoritative state of a game, broadcast after every change.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameSnapshot {
    pub code: String,
    pub host_id: Uuid,
    pub status: GameStatus,
    pub settings: GameSettingsDto,
    pub players: Vec<PlayerSnapshot>,
    pub created_at: String,
    pub updated_at: String,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Public projection of a player exposed to REST/SSE clients.
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
    /// Ratcheted score; never decreases.
    pub score: u32,
    pub bingo_count: u32,
    /// Live tally of the currently completed lines; may go down.
    pub line_score: u32,
    pub completed_lines: Vec<LineDto>,
    /// Cells in row-major order.
    pub grid: Vec<CellSnapshot>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CellSnapshot {
    pub id: String,
    pub song: Option<SongSnapshot>,
    pub marked: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SongSnapshot {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub cover: String,
    pub preview: Option<String>,
}

/// A completed bingo line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LineDto {
    /// `row`, `column`, `diagonal` or `anti_diagonal`.
    pub kind: String,
    /// Row or column index; absent for diagonals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl From<Line> for LineDto {
    fn from(value: Line) -> Self {
        let (kind, index) = match value {
            Line::Row(row) => ("row", Some(row)),
            Line::Column(col) => ("column", Some(col)),
            Line::Diagonal => ("diagonal", None),
            Line::AntiDiagonal => ("anti_diagonal", None),
        };
        Self {
            kind: kind.to_owned(),
            index,
        }
    }
}

/// Per-player effect of a mark command.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MarkReportDto {
    pub player_id: Uuid,
    pub completed_lines: Vec<LineDto>,
    /// Points handed out by this mark.
    pub awarded: u32,
    pub score: u32,
    pub bingo_count: u32,
}

impl From<&PlayerMarkReport> for MarkReportDto {
    fn from(value: &PlayerMarkReport) -> Self {
        Self {
            player_id: value.player_id,
            completed_lines: value.completed_lines.iter().copied().map(Into::into).collect(),
            awarded: value.awarded,
            score: value.score,
            bingo_count: value.bingo_count,
        }
    }
}

impl GameSnapshot {
    /// Project `game` for clients, overlaying refreshed preview URLs from `preview`.
    pub fn build<F>(game: &Game, rules: &ScoringRules, preview: F) -> Self
    where
        F: Fn(&SongId) -> Option<String>,
    {
        Self {
            code: game.code.to_string(),
            host_id: game.host_id,
            status: game.status,
            settings: game.settings.into(),
            players: game
                .players
                .values()
                .map(|player| PlayerSnapshot::build(player, rules, &preview))
                .collect(),
            created_at: format_system_time(game.created_at),
            updated_at: format_system_time(game.updated_at),
            version: game.version,
        }
    }
}

impl PlayerSnapshot {
    fn build<F>(player: &Player, rules: &ScoringRules, preview: &F) -> Self
    where
        F: Fn(&SongId) -> Option<String>,
    {
        let completed = player.completed_lines(rules);
        Self {
            id: player.id,
            name: player.name.clone(),
            avatar: player.avatar.clone(),
            score: player.card.score,
            bingo_count: player.card.bingo_count,
            line_score: rules.line_count_score(completed.len()),
            completed_lines: completed.into_iter().map(Into::into).collect(),
            grid: player
                .grid
                .cells()
                .iter()
                .map(|cell| CellSnapshot::build(cell, preview))
                .collect(),
        }
    }
}

impl CellSnapshot {
    fn build<F>(cell: &Cell, preview: &F) -> Self
    where
        F: Fn(&SongId) -> Option<String>,
    {
        Self {
            id: cell.id().to_owned(),
            song: cell.song().map(|song| SongSnapshot::build(song, preview)),
            marked: cell.is_marked(),
        }
    }
}

impl SongSnapshot {
    fn build<F>(song: &Song, preview: &F) -> Self
    where
        F: Fn(&SongId) -> Option<String>,
    {
        Self {
            id: song.id.to_string(),
            title: song.title.clone(),
            artist: song.artist.clone(),
            cover: song.cover.clone(),
            preview: preview(&song.id).or_else(|| song.preview.clone()),
        }
    }
}
