use std::time::{Duration, SystemTime};

use indexmap::IndexMap;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::models::{
        CellEntity, GameEntity, GameSettingsEntity, GameStatusEntity, PlayerEntity, SongEntity,
    },
    state::{
        code::{GameCode, GameCodeError},
        grid::{Grid, GridError, Song, SongId},
        lines::{self, Line},
        scoring::{ScoreCard, ScoringRules},
        state_machine::{FinishReason, GameEvent, GameStatus, InvalidTransition},
    },
};

/// Per-game options chosen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSettings {
    /// Forbid the same song in more than one grid cell across the whole game.
    pub no_duplicates: bool,
    /// Let players join after the game has started.
    pub allow_late_join: bool,
    /// Side length of every grid in this game.
    pub grid_size: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            no_duplicates: false,
            allow_late_join: false,
            grid_size: 4,
        }
    }
}

/// Participant of a game together with their grid and score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
    pub card: ScoreCard,
    pub grid: Grid,
}

impl Player {
    fn new(name: String, avatar: Option<String>, grid_size: usize) -> Result<Self, GridError> {
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            avatar,
            card: ScoreCard::default(),
            grid: Grid::new(grid_size)?,
        })
    }

    /// Lines currently complete on this player's grid.
    pub fn completed_lines(&self, rules: &ScoringRules) -> Vec<Line> {
        lines::completed_lines(&self.grid, rules.diagonals)
    }

    /// Recount completed lines and ratchet the score. Returns the points awarded.
    fn rescore(&mut self, rules: &ScoringRules) -> u32 {
        let completed = lines::count_completed(&self.grid, rules.diagonals);
        self.card.record(completed, rules)
    }
}

/// Domain failures raised while mutating a [`Game`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("game is finished")]
    Finished,
    #[error("cannot {operation} while the game is {status:?}")]
    WrongStatus {
        operation: &'static str,
        status: GameStatus,
    },
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("player `{0}` is not the host")]
    NotHost(Uuid),
    #[error("player `{0}` not found")]
    PlayerNotFound(Uuid),
    #[error("the host cannot leave the game")]
    HostRemoval,
    #[error("game is not accepting new players")]
    JoinClosed,
    #[error("song `{0}` is already on a grid in this game")]
    DuplicateSong(SongId),
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Report of how a mark changed one player's grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerMarkReport {
    pub player_id: Uuid,
    pub completed_lines: Vec<Line>,
    pub awarded: u32,
    pub score: u32,
    pub bingo_count: u32,
}

/// Result of a global mark propagation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MarkOutcome {
    /// Players whose grid changed, in join order.
    pub players: Vec<PlayerMarkReport>,
}

impl MarkOutcome {
    pub fn changed(&self) -> bool {
        !self.players.is_empty()
    }
}

/// Aggregate root shared by every participant of a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    pub code: GameCode,
    pub host_id: Uuid,
    pub status: GameStatus,
    pub settings: GameSettings,
    /// Players keyed by id, in join order.
    pub players: IndexMap<Uuid, Player>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    /// Optimistic concurrency token, bumped on every persisted change.
    pub version: u64,
}

impl Game {
    /// Open a new lobby with the host as its first player.
    pub fn new(
        code: GameCode,
        host_name: String,
        host_avatar: Option<String>,
        settings: GameSettings,
        now: SystemTime,
    ) -> Result<Self, GameError> {
        let host = Player::new(host_name, host_avatar, settings.grid_size)?;
        let host_id = host.id;
        let mut players = IndexMap::new();
        players.insert(host_id, host);

        Ok(Self {
            code,
            host_id,
            status: GameStatus::Lobby,
            settings,
            players,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    pub fn player(&self, player_id: Uuid) -> Result<&Player, GameError> {
        self.players
            .get(&player_id)
            .ok_or(GameError::PlayerNotFound(player_id))
    }

    /// Whether any player's grid holds `song_id`.
    pub fn song_in_use(&self, song_id: &SongId) -> bool {
        self.players
            .values()
            .any(|player| player.grid.contains_song(song_id))
    }

    /// Append a player, returning the new id.
    pub fn join(&mut self, name: String, avatar: Option<String>) -> Result<Uuid, GameError> {
        if !self.status.accepts_players(self.settings.allow_late_join) {
            return Err(GameError::JoinClosed);
        }
        let player = Player::new(name, avatar, self.settings.grid_size)?;
        let id = player.id;
        self.players.insert(id, player);
        Ok(id)
    }

    /// Delete a player on their explicit request.
    pub fn remove_player(&mut self, player_id: Uuid) -> Result<(), GameError> {
        self.ensure_not_finished()?;
        if player_id == self.host_id {
            return Err(GameError::HostRemoval);
        }
        self.players
            .shift_remove(&player_id)
            .map(|_| ())
            .ok_or(GameError::PlayerNotFound(player_id))
    }

    pub fn start(&mut self, actor: Uuid) -> Result<(), GameError> {
        self.ensure_host(actor)?;
        self.status = self.status.transition(GameEvent::Start)?;
        Ok(())
    }

    pub fn finish(&mut self, actor: Uuid) -> Result<(), GameError> {
        self.ensure_host(actor)?;
        self.status = self
            .status
            .transition(GameEvent::Finish(FinishReason::Host))?;
        Ok(())
    }

    pub fn is_expired(&self, now: SystemTime, ttl: Duration) -> bool {
        !self.status.is_finished()
            && now
                .duration_since(self.created_at)
                .is_ok_and(|age| age >= ttl)
    }

    /// Finish the game when it outlived `ttl`. Returns whether it was expired now.
    pub fn expire_if_due(&mut self, now: SystemTime, ttl: Duration) -> bool {
        if !self.is_expired(now, ttl) {
            return false;
        }
        match self
            .status
            .transition(GameEvent::Finish(FinishReason::Expired))
        {
            Ok(next) => {
                self.status = next;
                true
            }
            Err(_) => false,
        }
    }

    /// Reorder two cells of a player's grid during the lobby.
    pub fn swap_cells(
        &mut self,
        player_id: Uuid,
        a: usize,
        b: usize,
        rules: &ScoringRules,
    ) -> Result<bool, GameError> {
        self.ensure_status("swap cells", &[GameStatus::Lobby])?;
        let player = self.player_mut(player_id)?;
        let changed = player.grid.swap(a, b)?;
        if changed {
            player.rescore(rules);
        }
        Ok(changed)
    }

    /// Put a song into one of a player's empty cells.
    ///
    /// With `no_duplicates` the song must not appear on any grid of the game;
    /// the check happens before anything is touched. A song that was already
    /// called while playing lands marked and the player is rescored.
    pub fn assign_song(
        &mut self,
        player_id: Uuid,
        cell_id: &str,
        song: Song,
        rules: &ScoringRules,
    ) -> Result<(), GameError> {
        self.ensure_status("assign songs", &[GameStatus::Lobby, GameStatus::Playing])?;
        self.player(player_id)?;
        if self.settings.no_duplicates && self.song_in_use(&song.id) {
            return Err(GameError::DuplicateSong(song.id));
        }
        let called = self.status == GameStatus::Playing && self.song_called(&song.id);
        let song_id = song.id.clone();

        let player = self.player_mut(player_id)?;
        player.grid.assign(cell_id, song)?;
        if called {
            player.grid.set_song_marked(&song_id, true);
            player.rescore(rules);
        }
        Ok(())
    }

    /// Whether some grid of the game holds `song_id` marked.
    fn song_called(&self, song_id: &SongId) -> bool {
        self.players
            .values()
            .any(|player| player.grid.holds_marked(song_id))
    }

    /// Empty one of a player's cells.
    pub fn clear_cell(
        &mut self,
        player_id: Uuid,
        cell_id: &str,
        rules: &ScoringRules,
    ) -> Result<bool, GameError> {
        self.ensure_status("clear cells", &[GameStatus::Lobby, GameStatus::Playing])?;
        let player = self.player_mut(player_id)?;
        let changed = player.grid.clear(cell_id)?;
        if changed {
            player.rescore(rules);
        }
        Ok(changed)
    }

    /// Mark or unmark `song_id` on every grid that holds it and rescore the
    /// affected players with their own watermark.
    pub fn set_song_marked(
        &mut self,
        song_id: &SongId,
        marked: bool,
        rules: &ScoringRules,
    ) -> Result<MarkOutcome, GameError> {
        self.ensure_status("mark songs", &[GameStatus::Playing])?;

        let players = self
            .players
            .values_mut()
            .filter_map(|player| {
                if !player.grid.set_song_marked(song_id, marked) {
                    return None;
                }
                let awarded = player.rescore(rules);
                Some(PlayerMarkReport {
                    player_id: player.id,
                    completed_lines: player.completed_lines(rules),
                    awarded,
                    score: player.card.score,
                    bingo_count: player.card.bingo_count,
                })
            })
            .collect();

        Ok(MarkOutcome { players })
    }

    fn player_mut(&mut self, player_id: Uuid) -> Result<&mut Player, GameError> {
        self.players
            .get_mut(&player_id)
            .ok_or(GameError::PlayerNotFound(player_id))
    }

    fn ensure_host(&self, actor: Uuid) -> Result<(), GameError> {
        if actor != self.host_id {
            return Err(GameError::NotHost(actor));
        }
        Ok(())
    }

    fn ensure_not_finished(&self) -> Result<(), GameError> {
        if self.status.is_finished() {
            return Err(GameError::Finished);
        }
        Ok(())
    }

    fn ensure_status(
        &self,
        operation: &'static str,
        allowed: &[GameStatus],
    ) -> Result<(), GameError> {
        self.ensure_not_finished()?;
        if !allowed.contains(&self.status) {
            return Err(GameError::WrongStatus {
                operation,
                status: self.status,
            });
        }
        Ok(())
    }
}

/// Failure to rebuild a [`Game`] from a persisted record.
#[derive(Debug, Error)]
pub enum PersistedGameError {
    #[error("stored game code `{code}` is invalid")]
    Code {
        code: String,
        #[source]
        source: GameCodeError,
    },
    #[error("grid of player `{player_id}` is inconsistent")]
    Grid {
        player_id: Uuid,
        #[source]
        source: GridError,
    },
    #[error("host `{0}` is not among the players")]
    MissingHost(Uuid),
}

impl From<SongEntity> for Song {
    fn from(value: SongEntity) -> Self {
        Self {
            id: SongId::new(value.id),
            title: value.title,
            artist: value.artist,
            cover: value.cover,
            preview: value.preview,
        }
    }
}

impl From<Song> for SongEntity {
    fn from(value: Song) -> Self {
        Self {
            id: value.id.as_str().to_owned(),
            title: value.title,
            artist: value.artist,
            cover: value.cover,
            preview: value.preview,
        }
    }
}

impl From<GameStatusEntity> for GameStatus {
    fn from(value: GameStatusEntity) -> Self {
        match value {
            GameStatusEntity::Lobby => GameStatus::Lobby,
            GameStatusEntity::Playing => GameStatus::Playing,
            GameStatusEntity::Finished => GameStatus::Finished,
        }
    }
}

impl From<GameStatus> for GameStatusEntity {
    fn from(value: GameStatus) -> Self {
        match value {
            GameStatus::Lobby => GameStatusEntity::Lobby,
            GameStatus::Playing => GameStatusEntity::Playing,
            GameStatus::Finished => GameStatusEntity::Finished,
        }
    }
}

impl From<GameSettingsEntity> for GameSettings {
    fn from(value: GameSettingsEntity) -> Self {
        Self {
            no_duplicates: value.no_duplicates,
            allow_late_join: value.allow_late_join,
            grid_size: value.grid_size as usize,
        }
    }
}

impl From<GameSettings> for GameSettingsEntity {
    fn from(value: GameSettings) -> Self {
        Self {
            no_duplicates: value.no_duplicates,
            allow_late_join: value.allow_late_join,
            grid_size: value.grid_size as u32,
        }
    }
}

impl From<Player> for PlayerEntity {
    fn from(value: Player) -> Self {
        Self {
            id: value.id,
            name: value.name,
            avatar: value.avatar,
            score: value.card.score,
            bingo_count: value.card.bingo_count,
            cells: value
                .grid
                .cells()
                .iter()
                .map(|cell| CellEntity {
                    id: cell.id().to_owned(),
                    song: cell.song().cloned().map(Into::into),
                    marked: cell.is_marked(),
                })
                .collect(),
        }
    }
}

impl Player {
    fn try_from_entity(entity: PlayerEntity, grid_size: usize) -> Result<Self, PersistedGameError> {
        let player_id = entity.id;
        let grid = Grid::from_parts(
            grid_size,
            entity
                .cells
                .into_iter()
                .map(|cell| (cell.id, cell.song.map(Into::into), cell.marked)),
        )
        .map_err(|source| PersistedGameError::Grid { player_id, source })?;

        Ok(Self {
            id: entity.id,
            name: entity.name,
            avatar: entity.avatar,
            card: ScoreCard::new(entity.score, entity.bingo_count),
            grid,
        })
    }
}

impl TryFrom<GameEntity> for Game {
    type Error = PersistedGameError;

    fn try_from(value: GameEntity) -> Result<Self, Self::Error> {
        let code = GameCode::parse(&value.code).map_err(|source| PersistedGameError::Code {
            code: value.code.clone(),
            source,
        })?;
        let settings: GameSettings = value.settings.into();
        let players = value
            .players
            .into_iter()
            .map(|entity| {
                Player::try_from_entity(entity, settings.grid_size).map(|p| (p.id, p))
            })
            .collect::<Result<IndexMap<_, _>, _>>()?;

        if !players.contains_key(&value.host_id) {
            return Err(PersistedGameError::MissingHost(value.host_id));
        }

        Ok(Self {
            code,
            host_id: value.host_id,
            status: value.status.into(),
            settings,
            players,
            created_at: value.created_at,
            updated_at: value.updated_at,
            version: value.version,
        })
    }
}

impl From<Game> for GameEntity {
    fn from(value: Game) -> Self {
        Self {
            code: value.code.into(),
            host_id: value.host_id,
            status: value.status.into(),
            settings: value.settings.into(),
            players: value.players.into_values().map(Into::into).collect(),
            created_at: value.created_at,
            updated_at: value.updated_at,
            version: value.version,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::state::grid::tests::song;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    pub(crate) fn lobby(settings: GameSettings) -> (Game, Uuid) {
        let game = Game::new(
            GameCode::parse("ABC123").unwrap(),
            "Host".into(),
            None,
            settings,
            SystemTime::UNIX_EPOCH,
        )
        .unwrap();
        let host = game.host_id;
        (game, host)
    }

    fn fill_row(game: &mut Game, player: Uuid, row: usize, prefix: &str) -> Vec<SongId> {
        let rules = ScoringRules::default();
        (0..4)
            .map(|col| {
                let id = format!("{prefix}{col}");
                let cell_id = format!("cell-{}", row * 4 + col);
                game.assign_song(player, &cell_id, song(&id), &rules)
                    .unwrap();
                SongId::from(id.as_str())
            })
            .collect()
    }

    #[test]
    fn host_is_first_player() {
        let (game, host) = lobby(GameSettings::default());
        assert_eq!(game.players.len(), 1);
        assert_eq!(game.player(host).unwrap().name, "Host");
        assert_eq!(game.player(host).unwrap().grid.len(), 16);
        assert_eq!(game.status, GameStatus::Lobby);
    }

    #[test]
    fn row_in_any_order_scores_exactly_once() {
        let orders: [[usize; 4]; 4] = [[0, 1, 2, 3], [3, 2, 1, 0], [2, 0, 3, 1], [1, 3, 0, 2]];
        let rules = ScoringRules::default();
        for order in orders {
            let (mut game, host) = lobby(GameSettings::default());
            let songs = fill_row(&mut game, host, 0, "s");
            game.start(host).unwrap();

            for (step, &index) in order.iter().enumerate() {
                let outcome = game.set_song_marked(&songs[index], true, &rules).unwrap();
                assert!(outcome.changed());
                let expected = if step == 3 { 100 } else { 0 };
                assert_eq!(outcome.players[0].awarded, expected);
            }

            let player = game.player(host).unwrap();
            assert_eq!(player.completed_lines(&rules), vec![Line::Row(0)]);
            assert_eq!(player.card, ScoreCard::new(100, 1));
        }
    }

    #[test]
    fn marking_propagates_to_every_grid_holding_the_song() {
        let rules = ScoringRules::default();
        let (mut game, host) = lobby(GameSettings::default());
        let guest = game.join("Guest".into(), None).unwrap();
        let other = game.join("Other".into(), None).unwrap();
        game.assign_song(host, "cell-0", song("shared"), &rules).unwrap();
        game.assign_song(guest, "cell-7", song("shared"), &rules).unwrap();
        game.assign_song(other, "cell-1", song("mine"), &rules).unwrap();
        game.start(host).unwrap();

        let outcome = game
            .set_song_marked(&SongId::from("shared"), true, &rules)
            .unwrap();
        let touched: Vec<_> = outcome.players.iter().map(|r| r.player_id).collect();
        assert_eq!(touched, vec![host, guest]);
        assert!(game.player(host).unwrap().grid.cell(0).unwrap().is_marked());
        assert!(game.player(guest).unwrap().grid.cell(7).unwrap().is_marked());
        assert!(!game.player(other).unwrap().grid.cell(1).unwrap().is_marked());
    }

    #[test]
    fn marking_is_idempotent() {
        let rules = ScoringRules::default();
        let (mut game, host) = lobby(GameSettings::default());
        let songs = fill_row(&mut game, host, 1, "s");
        game.start(host).unwrap();
        for id in &songs {
            game.set_song_marked(id, true, &rules).unwrap();
        }
        let once = game.clone();

        let again = game.set_song_marked(&songs[0], true, &rules).unwrap();
        assert!(!again.changed());
        assert_eq!(game, once);
    }

    #[test]
    fn simultaneous_bingo_for_every_holder() {
        let rules = ScoringRules::default();
        let (mut game, host) = lobby(GameSettings::default());
        let guest = game.join("Guest".into(), None).unwrap();
        let songs = fill_row(&mut game, host, 0, "s");
        for (col, id) in songs.iter().enumerate() {
            let cell_id = format!("cell-{}", col * 4);
            game.assign_song(guest, &cell_id, song(id.as_str()), &rules)
                .unwrap();
        }
        game.start(host).unwrap();

        let mut last = MarkOutcome::default();
        for id in &songs {
            last = game.set_song_marked(id, true, &rules).unwrap();
        }
        assert_eq!(last.players.len(), 2);
        assert_eq!(last.players[0].completed_lines, vec![Line::Row(0)]);
        assert_eq!(last.players[1].completed_lines, vec![Line::Column(0)]);
        assert!(last.players.iter().all(|r| r.awarded == 100 && r.score == 100));
    }

    #[test]
    fn shared_mark_scores_against_each_players_own_watermark() {
        let rules = ScoringRules::default();
        let (mut game, host) = lobby(GameSettings::default());
        let guest = game.join("Guest".into(), None).unwrap();
        let row = fill_row(&mut game, host, 0, "s");
        for (index, id) in ["r0", "r1", "r2", "x"].into_iter().enumerate() {
            let cell_id = format!("cell-{}", 4 + index);
            game.assign_song(host, &cell_id, song(id), &rules).unwrap();
        }
        for (index, id) in ["g0", "g1", "g2", "x"].into_iter().enumerate() {
            let cell_id = format!("cell-{index}");
            game.assign_song(guest, &cell_id, song(id), &rules).unwrap();
        }
        game.start(host).unwrap();

        for id in &row {
            game.set_song_marked(id, true, &rules).unwrap();
        }
        // The host keeps a watermark of one line with none currently complete.
        game.set_song_marked(&row[1], false, &rules).unwrap();
        assert_eq!(game.player(host).unwrap().card, ScoreCard::new(100, 1));
        for id in ["r0", "r1", "r2", "g0", "g1", "g2"] {
            game.set_song_marked(&SongId::from(id), true, &rules).unwrap();
        }

        let outcome = game
            .set_song_marked(&SongId::from("x"), true, &rules)
            .unwrap();
        let [host_report, guest_report] = outcome.players.as_slice() else {
            panic!("expected both holders in the outcome");
        };
        assert_eq!(host_report.player_id, host);
        assert_eq!(host_report.completed_lines, vec![Line::Row(1)]);
        assert_eq!((host_report.awarded, host_report.score), (0, 100));
        assert_eq!(host_report.bingo_count, 1);
        assert_eq!(guest_report.player_id, guest);
        assert_eq!(guest_report.completed_lines, vec![Line::Row(0)]);
        assert_eq!((guest_report.awarded, guest_report.score), (100, 100));
        assert_eq!(guest_report.bingo_count, 1);

        let outcome = game.set_song_marked(&row[1], true, &rules).unwrap();
        assert_eq!(outcome.players.len(), 1);
        assert_eq!(outcome.players[0].awarded, 100);
        assert_eq!(game.player(host).unwrap().card, ScoreCard::new(200, 2));
        assert_eq!(game.player(guest).unwrap().card, ScoreCard::new(100, 1));
    }

    #[test]
    fn called_songs_land_marked_while_playing() {
        let rules = ScoringRules::default();
        let (mut game, host) = lobby(GameSettings::default());
        let guest = game.join("Guest".into(), None).unwrap();
        let row = fill_row(&mut game, host, 0, "s");
        for (index, id) in row.iter().take(3).enumerate() {
            let cell_id = format!("cell-{index}");
            game.assign_song(guest, &cell_id, song(id.as_str()), &rules)
                .unwrap();
        }
        game.start(host).unwrap();
        for id in &row {
            game.set_song_marked(id, true, &rules).unwrap();
        }
        assert_eq!(game.player(guest).unwrap().card, ScoreCard::default());

        game.assign_song(guest, "cell-3", song("s3"), &rules).unwrap();
        let player = game.player(guest).unwrap();
        assert!(player.grid.cell(3).unwrap().is_marked());
        assert_eq!(player.completed_lines(&rules), vec![Line::Row(0)]);
        assert_eq!(player.card, ScoreCard::new(100, 1));

        game.assign_song(guest, "cell-8", song("fresh"), &rules)
            .unwrap();
        assert!(!game.player(guest).unwrap().grid.cell(8).unwrap().is_marked());
    }

    #[test]
    fn songs_assigned_in_the_lobby_start_unmarked() {
        let rules = ScoringRules::default();
        let (mut game, host) = lobby(GameSettings::default());
        let guest = game.join("Guest".into(), None).unwrap();
        game.assign_song(host, "cell-0", song("a"), &rules).unwrap();
        game.assign_song(guest, "cell-0", song("a"), &rules).unwrap();
        assert!(!game.player(guest).unwrap().grid.cell(0).unwrap().is_marked());
    }

    #[test]
    fn unmarking_a_scored_row_keeps_the_score() {
        let rules = ScoringRules::default();
        let (mut game, host) = lobby(GameSettings::default());
        let songs = fill_row(&mut game, host, 2, "s");
        game.start(host).unwrap();
        for id in &songs {
            game.set_song_marked(id, true, &rules).unwrap();
        }

        let outcome = game.set_song_marked(&songs[1], false, &rules).unwrap();
        assert!(outcome.changed());
        assert!(outcome.players[0].completed_lines.is_empty());
        assert_eq!(game.player(host).unwrap().card, ScoreCard::new(100, 1));

        // Completing the same row again does not pay twice.
        let outcome = game.set_song_marked(&songs[1], true, &rules).unwrap();
        assert_eq!(outcome.players[0].awarded, 0);
        assert_eq!(game.player(host).unwrap().card, ScoreCard::new(100, 1));
    }

    #[test]
    fn duplicate_songs_are_rejected_across_players() {
        let rules = ScoringRules::default();
        let (mut game, host) = lobby(GameSettings {
            no_duplicates: true,
            ..GameSettings::default()
        });
        let guest = game.join("Guest".into(), None).unwrap();
        game.assign_song(host, "cell-0", song("a"), &rules).unwrap();
        let before = game.clone();

        let err = game.assign_song(guest, "cell-0", song("a"), &rules).unwrap_err();
        assert_eq!(err, GameError::DuplicateSong(SongId::from("a")));
        assert_eq!(game, before);

        let err = game.assign_song(host, "cell-1", song("a"), &rules).unwrap_err();
        assert_eq!(err, GameError::DuplicateSong(SongId::from("a")));
    }

    #[test]
    fn duplicates_are_fine_without_the_setting() {
        let rules = ScoringRules::default();
        let (mut game, host) = lobby(GameSettings::default());
        let guest = game.join("Guest".into(), None).unwrap();
        game.assign_song(host, "cell-0", song("a"), &rules).unwrap();
        game.assign_song(guest, "cell-0", song("a"), &rules).unwrap();
        assert!(game.player(guest).unwrap().grid.contains_song(&SongId::from("a")));
    }

    #[test]
    fn swap_is_lobby_only() {
        let rules = ScoringRules::default();
        let (mut game, host) = lobby(GameSettings::default());
        game.assign_song(host, "cell-0", song("a"), &rules).unwrap();
        assert!(game.swap_cells(host, 0, 5, &rules).unwrap());
        assert!(!game.swap_cells(host, 5, 5, &rules).unwrap());

        game.start(host).unwrap();
        assert_eq!(
            game.swap_cells(host, 0, 5, &rules),
            Err(GameError::WrongStatus {
                operation: "swap cells",
                status: GameStatus::Playing
            })
        );
    }

    #[test]
    fn finished_game_rejects_every_mutation() {
        let rules = ScoringRules::default();
        let (mut game, host) = lobby(GameSettings::default());
        let guest = game.join("Guest".into(), None).unwrap();
        game.start(host).unwrap();
        game.finish(host).unwrap();

        assert_eq!(
            game.assign_song(host, "cell-0", song("a"), &rules),
            Err(GameError::Finished)
        );
        assert_eq!(game.clear_cell(host, "cell-0", &rules), Err(GameError::Finished));
        assert_eq!(game.swap_cells(host, 0, 1, &rules), Err(GameError::Finished));
        assert_eq!(
            game.set_song_marked(&SongId::from("a"), true, &rules),
            Err(GameError::Finished)
        );
        assert_eq!(game.remove_player(guest), Err(GameError::Finished));
        assert_eq!(game.join("Late".into(), None), Err(GameError::JoinClosed));
        assert!(matches!(
            game.start(host),
            Err(GameError::InvalidTransition(_))
        ));
    }

    #[test]
    fn only_the_host_drives_the_lifecycle() {
        let (mut game, _host) = lobby(GameSettings::default());
        let guest = game.join("Guest".into(), None).unwrap();
        assert_eq!(game.start(guest), Err(GameError::NotHost(guest)));
        assert_eq!(game.finish(guest), Err(GameError::NotHost(guest)));
        assert_eq!(game.status, GameStatus::Lobby);
    }

    #[test]
    fn late_join_follows_settings() {
        let (mut game, host) = lobby(GameSettings::default());
        game.start(host).unwrap();
        assert_eq!(game.join("Late".into(), None), Err(GameError::JoinClosed));

        let (mut game, host) = lobby(GameSettings {
            allow_late_join: true,
            ..GameSettings::default()
        });
        game.start(host).unwrap();
        assert!(game.join("Late".into(), None).is_ok());
    }

    #[test]
    fn players_leave_only_by_request_and_host_stays() {
        let (mut game, host) = lobby(GameSettings::default());
        let guest = game.join("Guest".into(), None).unwrap();
        assert_eq!(game.remove_player(host), Err(GameError::HostRemoval));
        game.remove_player(guest).unwrap();
        assert_eq!(game.remove_player(guest), Err(GameError::PlayerNotFound(guest)));
        assert_eq!(game.players.len(), 1);
    }

    #[test]
    fn games_expire_after_their_ttl() {
        let (mut game, _host) = lobby(GameSettings::default());
        let almost = SystemTime::UNIX_EPOCH + DAY - Duration::from_secs(1);
        assert!(!game.expire_if_due(almost, DAY));
        assert_eq!(game.status, GameStatus::Lobby);

        assert!(game.expire_if_due(SystemTime::UNIX_EPOCH + DAY, DAY));
        assert_eq!(game.status, GameStatus::Finished);
        assert!(!game.expire_if_due(SystemTime::UNIX_EPOCH + DAY * 2, DAY));
    }

    #[test]
    fn marking_requires_a_running_game() {
        let rules = ScoringRules::default();
        let (mut game, _host) = lobby(GameSettings::default());
        assert_eq!(
            game.set_song_marked(&SongId::from("a"), true, &rules),
            Err(GameError::WrongStatus {
                operation: "mark songs",
                status: GameStatus::Lobby
            })
        );
    }

    #[test]
    fn entity_conversion_keeps_the_game() {
        let rules = ScoringRules::default();
        let (mut game, host) = lobby(GameSettings::default());
        let guest = game.join("Guest".into(), Some("🎸".into())).unwrap();
        let songs = fill_row(&mut game, host, 0, "s");
        game.assign_song(guest, "cell-3", song("s1"), &rules).unwrap();
        game.start(host).unwrap();
        for id in &songs {
            game.set_song_marked(id, true, &rules).unwrap();
        }

        let entity: GameEntity = game.clone().into();
        let restored = Game::try_from(entity).unwrap();
        assert_eq!(restored, game);
        assert_eq!(
            restored.players.keys().copied().collect::<Vec<_>>(),
            vec![host, guest]
        );
    }

    #[test]
    fn corrupted_entity_is_rejected() {
        let (game, _host) = lobby(GameSettings::default());
        let mut entity: GameEntity = game.into();
        entity.players[0].cells.pop();
        assert!(matches!(
            Game::try_from(entity),
            Err(PersistedGameError::Grid { .. })
        ));
    }
}
