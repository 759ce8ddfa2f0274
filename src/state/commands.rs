//! Commands accepted by the authoritative game service.
//!
//! Every mutation of a [`Game`] goes through [`GameCommand::apply`], both on the
//! server (under the per-game gate, before the versioned write) and on clients
//! that keep an optimistic [`Replica`](crate::state::replica::Replica).

use uuid::Uuid;

use crate::state::{
    game::{Game, GameError, MarkOutcome},
    grid::{Song, SongId},
    scoring::ScoringRules,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameCommand {
    Join {
        name: String,
        avatar: Option<String>,
    },
    RemovePlayer {
        player_id: Uuid,
    },
    Start {
        actor: Uuid,
    },
    Finish {
        actor: Uuid,
    },
    Swap {
        player_id: Uuid,
        a: usize,
        b: usize,
    },
    AssignSong {
        player_id: Uuid,
        cell_id: String,
        song: Song,
    },
    ClearCell {
        player_id: Uuid,
        cell_id: String,
    },
    /// Mark or unmark a song on every grid of the game.
    SetSongMarked {
        actor: Uuid,
        song_id: SongId,
        marked: bool,
    },
}

/// What a command did to the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Joined(Uuid),
    Changed,
    Unchanged,
    Marked(MarkOutcome),
}

impl CommandOutcome {
    /// Whether the game must be persisted and broadcast.
    pub fn changed(&self) -> bool {
        match self {
            CommandOutcome::Joined(_) | CommandOutcome::Changed => true,
            CommandOutcome::Unchanged => false,
            CommandOutcome::Marked(outcome) => outcome.changed(),
        }
    }

    fn from_flag(changed: bool) -> Self {
        if changed {
            CommandOutcome::Changed
        } else {
            CommandOutcome::Unchanged
        }
    }
}

impl GameCommand {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            GameCommand::Join { .. } => "join",
            GameCommand::RemovePlayer { .. } => "remove_player",
            GameCommand::Start { .. } => "start",
            GameCommand::Finish { .. } => "finish",
            GameCommand::Swap { .. } => "swap",
            GameCommand::AssignSong { .. } => "assign_song",
            GameCommand::ClearCell { .. } => "clear_cell",
            GameCommand::SetSongMarked { .. } => "set_song_marked",
        }
    }

    /// Apply the command to `game`. On error the game is left untouched.
    pub fn apply(
        &self,
        game: &mut Game,
        rules: &ScoringRules,
    ) -> Result<CommandOutcome, GameError> {
        match self {
            GameCommand::Join { name, avatar } => {
                let id = game.join(name.clone(), avatar.clone())?;
                Ok(CommandOutcome::Joined(id))
            }
            GameCommand::RemovePlayer { player_id } => {
                game.remove_player(*player_id)?;
                Ok(CommandOutcome::Changed)
            }
            GameCommand::Start { actor } => {
                game.start(*actor)?;
                Ok(CommandOutcome::Changed)
            }
            GameCommand::Finish { actor } => {
                game.finish(*actor)?;
                Ok(CommandOutcome::Changed)
            }
            GameCommand::Swap { player_id, a, b } => game
                .swap_cells(*player_id, *a, *b, rules)
                .map(CommandOutcome::from_flag),
            GameCommand::AssignSong {
                player_id,
                cell_id,
                song,
            } => {
                game.assign_song(*player_id, cell_id, song.clone(), rules)?;
                Ok(CommandOutcome::Changed)
            }
            GameCommand::ClearCell { player_id, cell_id } => game
                .clear_cell(*player_id, cell_id, rules)
                .map(CommandOutcome::from_flag),
            GameCommand::SetSongMarked {
                actor,
                song_id,
                marked,
            } => {
                game.player(*actor)?;
                game.set_song_marked(song_id, *marked, rules)
                    .map(CommandOutcome::Marked)
            }
        }
    }
}
