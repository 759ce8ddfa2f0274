//! Client-side view of a game with optimistic updates.

use crate::state::{
    commands::{CommandOutcome, GameCommand},
    game::{Game, GameError},
    scoring::ScoringRules,
};

/// Local copy of a game held by a participant.
///
/// Local commands are applied immediately so the UI reacts without waiting on
/// the server. Authoritative snapshots always replace the whole view; nothing
/// is merged, so a rejected or lost command disappears on the next snapshot.
#[derive(Debug, Clone)]
pub struct Replica {
    view: Game,
    rules: ScoringRules,
    pending: usize,
}

impl Replica {
    pub fn new(snapshot: Game, rules: ScoringRules) -> Self {
        Self {
            view: snapshot,
            rules,
            pending: 0,
        }
    }

    pub fn view(&self) -> &Game {
        &self.view
    }

    /// Number of local changes not yet confirmed by a snapshot.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Optimistically apply `command` to the local view.
    pub fn apply_local(&mut self, command: &GameCommand) -> Result<CommandOutcome, GameError> {
        let outcome = command.apply(&mut self.view, &self.rules)?;
        if outcome.changed() {
            self.pending += 1;
        }
        Ok(outcome)
    }

    /// Replace the view with an authoritative snapshot.
    pub fn on_snapshot(&mut self, snapshot: Game) {
        self.view = snapshot;
        self.pending = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        game::{GameSettings, tests::lobby},
        grid::{SongId, tests::song},
    };

    #[test]
    fn local_changes_show_up_immediately() {
        let (game, host) = lobby(GameSettings::default());
        let mut replica = Replica::new(game, ScoringRules::default());

        replica
            .apply_local(&GameCommand::AssignSong {
                player_id: host,
                cell_id: "cell-0".into(),
                song: song("a"),
            })
            .unwrap();

        assert_eq!(replica.pending(), 1);
        assert!(replica.view().song_in_use(&SongId::from("a")));
    }

    #[test]
    fn snapshot_overwrites_optimistic_state() {
        let (game, host) = lobby(GameSettings::default());
        let authoritative = game.clone();
        let mut replica = Replica::new(game, ScoringRules::default());

        replica
            .apply_local(&GameCommand::AssignSong {
                player_id: host,
                cell_id: "cell-0".into(),
                song: song("a"),
            })
            .unwrap();
        replica.on_snapshot(authoritative.clone());

        assert_eq!(replica.view(), &authoritative);
        assert_eq!(replica.pending(), 0);
    }

    #[test]
    fn rejected_local_command_leaves_view_alone() {
        let (game, _host) = lobby(GameSettings::default());
        let before = game.clone();
        let mut replica = Replica::new(game, ScoringRules::default());

        let result = replica.apply_local(&GameCommand::SetSongMarked {
            actor: before.host_id,
            song_id: SongId::from("a"),
            marked: true,
        });
        assert!(result.is_err());
        assert_eq!(replica.view(), &before);
        assert_eq!(replica.pending(), 0);
    }
}
