use std::{sync::Arc, time::SystemTime};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::game_store::GameStore,
    dto::{
        game::{
            CreateGameRequest, GameSnapshot, JoinGameRequest, MarkReportDto, PlayerSessionResponse,
        },
        grid::{
            AssignSongRequest, ClearCellRequest, MarkSongRequest, MarkSongResponse,
            PreviewUpdateRequest, PreviewUpdateResponse, SwapCellsRequest,
        },
    },
    error::ServiceError,
    services::sse_events,
    state::{
        SharedState,
        code::GameCode,
        commands::{CommandOutcome, GameCommand},
        game::{Game, GameError, GameSettings},
        grid::SongId,
    },
};

/// Fresh codes tried before giving up on creating a game.
const CODE_ATTEMPTS: usize = 8;

/// Open a new lobby; the requester becomes its host and first player.
pub async fn create_game(
    state: &SharedState,
    request: CreateGameRequest,
) -> Result<PlayerSessionResponse, ServiceError> {
    let config = state.config();
    let grid_size = request.grid_size.unwrap_or(config.default_grid_size);
    if !config.accepts_grid_size(grid_size) {
        return Err(ServiceError::InvalidInput(format!(
            "grid size {grid_size} is not supported (max {})",
            config.max_grid_size
        )));
    }
    let settings = GameSettings {
        no_duplicates: request.no_duplicates,
        allow_late_join: request.allow_late_join,
        grid_size,
    };

    let store = state.require_game_store().await?;
    for _ in 0..CODE_ATTEMPTS {
        let game = Game::new(
            GameCode::generate(),
            request.host_name.trim().to_owned(),
            request.host_avatar.clone(),
            settings,
            SystemTime::now(),
        )?;

        match store.save_game(game.clone().into(), None).await {
            Ok(()) => {
                info!(code = %game.code, grid_size, "game created");
                return Ok(PlayerSessionResponse {
                    player_id: game.host_id,
                    game: snapshot(state, &game),
                });
            }
            Err(err) if err.is_conflict() => {
                debug!(code = %game.code, "game code already taken; drawing another");
            }
            Err(err) => {
                warn!(code = %game.code, error = %err, "failed to persist new game");
                return Err(err.into());
            }
        }
    }

    Err(ServiceError::Conflict(
        "could not allocate a free game code".into(),
    ))
}

/// Read the current snapshot of a game, finishing it first when it expired.
pub async fn get_game(state: &SharedState, code: &str) -> Result<GameSnapshot, ServiceError> {
    let code = parse_code(code)?;
    let game = current_game(state, &code).await?;
    Ok(snapshot(state, &game))
}

/// Load `code`, applying the lazy expiry when it is due.
pub(crate) async fn current_game(
    state: &SharedState,
    code: &GameCode,
) -> Result<Game, ServiceError> {
    let store = state.require_game_store().await?;
    let game = load(&store, code).await?;
    if !game.is_expired(SystemTime::now(), state.config().game_ttl()) {
        return Ok(game);
    }
    let committed = transact(state, code, |_| Ok(((), false)), |_, _| {}).await?;
    Ok(committed.game)
}

/// Finish `code` if it outlived its time to live. Returns whether it was expired now.
pub async fn expire_game(state: &SharedState, code: &GameCode) -> Result<bool, ServiceError> {
    let committed = transact(state, code, |_| Ok(((), false)), |_, _| {}).await?;
    Ok(committed.written)
}

/// Delete `code` from the store if it finished and has not changed since `cutoff`.
///
/// The check is repeated under the game's gate so a command that is still
/// being applied keeps the game alive.
pub async fn purge_game(
    state: &SharedState,
    code: &GameCode,
    cutoff: SystemTime,
) -> Result<bool, ServiceError> {
    let gate = state.game_gate(code);
    let result = {
        let _guard = gate.lock().await;
        purge_locked(state, code, cutoff).await
    };
    drop(gate);
    state.prune_gate(code);
    result
}

async fn purge_locked(
    state: &SharedState,
    code: &GameCode,
    cutoff: SystemTime,
) -> Result<bool, ServiceError> {
    let store = state.require_game_store().await?;
    let game = load(&store, code).await?;
    if !game.status.is_finished() || game.updated_at > cutoff {
        return Ok(false);
    }
    let removed = store
        .delete_game(code.to_string())
        .await
        .inspect_err(|err| warn!(%code, error = %err, "failed to delete game"))?;
    if removed {
        info!(%code, "finished game purged");
    }
    Ok(removed)
}

pub async fn join_game(
    state: &SharedState,
    code: &str,
    request: JoinGameRequest,
) -> Result<PlayerSessionResponse, ServiceError> {
    let code = parse_code(code)?;
    let command = GameCommand::Join {
        name: request.name.trim().to_owned(),
        avatar: request.avatar,
    };
    let (game, outcome) = execute(state, &code, &command).await?;
    let CommandOutcome::Joined(player_id) = outcome else {
        return Err(ServiceError::InvalidState("join did not add a player".into()));
    };
    info!(%code, %player_id, "player joined");
    Ok(PlayerSessionResponse {
        player_id,
        game: snapshot(state, &game),
    })
}

pub async fn remove_player(
    state: &SharedState,
    code: &str,
    player_id: Uuid,
) -> Result<GameSnapshot, ServiceError> {
    run(state, code, GameCommand::RemovePlayer { player_id }).await
}

pub async fn start_game(
    state: &SharedState,
    code: &str,
    actor: Uuid,
) -> Result<GameSnapshot, ServiceError> {
    run(state, code, GameCommand::Start { actor }).await
}

pub async fn finish_game(
    state: &SharedState,
    code: &str,
    actor: Uuid,
) -> Result<GameSnapshot, ServiceError> {
    run(state, code, GameCommand::Finish { actor }).await
}

pub async fn swap_cells(
    state: &SharedState,
    code: &str,
    player_id: Uuid,
    request: SwapCellsRequest,
) -> Result<GameSnapshot, ServiceError> {
    let command = GameCommand::Swap {
        player_id,
        a: request.a,
        b: request.b,
    };
    run(state, code, command).await
}

pub async fn assign_song(
    state: &SharedState,
    code: &str,
    player_id: Uuid,
    request: AssignSongRequest,
) -> Result<GameSnapshot, ServiceError> {
    let command = GameCommand::AssignSong {
        player_id,
        cell_id: request.cell_id,
        song: request.song.into(),
    };
    run(state, code, command).await
}

pub async fn clear_cell(
    state: &SharedState,
    code: &str,
    player_id: Uuid,
    request: ClearCellRequest,
) -> Result<GameSnapshot, ServiceError> {
    let command = GameCommand::ClearCell {
        player_id,
        cell_id: request.cell_id,
    };
    run(state, code, command).await
}

/// Mark (or unmark) a song on every grid of the game in one write.
pub async fn mark_song(
    state: &SharedState,
    code: &str,
    request: MarkSongRequest,
) -> Result<MarkSongResponse, ServiceError> {
    let code = parse_code(code)?;
    let command = GameCommand::SetSongMarked {
        actor: request.player_id,
        song_id: request.song_id,
        marked: request.marked,
    };
    let (game, outcome) = execute(state, &code, &command).await?;
    let players = match &outcome {
        CommandOutcome::Marked(outcome) => {
            outcome.players.iter().map(MarkReportDto::from).collect()
        }
        _ => Vec::new(),
    };
    Ok(MarkSongResponse {
        changed: outcome.changed(),
        players,
        game: snapshot(state, &game),
    })
}

/// Remember a refreshed preview URL; it is overlaid on every later snapshot.
pub fn refresh_preview(
    state: &SharedState,
    song_id: &str,
    request: PreviewUpdateRequest,
) -> Result<PreviewUpdateResponse, ServiceError> {
    let song_id = song_id.trim();
    if song_id.is_empty() {
        return Err(ServiceError::InvalidInput("song id must not be empty".into()));
    }
    state.set_preview(SongId::from(song_id), request.preview.clone());
    debug!(song_id, cleared = request.preview.is_none(), "song preview refreshed");
    Ok(PreviewUpdateResponse {
        song_id: song_id.to_owned(),
        preview: request.preview,
    })
}

/// Apply `command` to the authoritative record of `code`.
///
/// Commands for one game are serialized through its gate. The record is
/// loaded, the command applied to it, and the result written back only when
/// something changed, guarded by the version read. A concurrent writer makes
/// the write fail with a version conflict, in which case the whole cycle is
/// retried up to the configured number of attempts.
pub async fn execute(
    state: &SharedState,
    code: &GameCode,
    command: &GameCommand,
) -> Result<(Game, CommandOutcome), ServiceError> {
    let rules = state.config().scoring_rules();
    let committed = transact(
        state,
        code,
        |game| {
            let outcome = command.apply(game, &rules)?;
            let changed = outcome.changed();
            Ok((outcome, changed))
        },
        |game, outcome| {
            if let (
                GameCommand::SetSongMarked {
                    song_id, marked, ..
                },
                CommandOutcome::Marked(marks),
            ) = (command, outcome)
            {
                sse_events::broadcast_song_marked(state, &game.code, song_id, *marked, marks);
            }
        },
    )
    .await?;

    debug!(
        %code,
        command = command.name(),
        written = committed.written,
        version = committed.game.version,
        "command applied"
    );
    Ok((committed.game, committed.output))
}

async fn run(
    state: &SharedState,
    code: &str,
    command: GameCommand,
) -> Result<GameSnapshot, ServiceError> {
    let code = parse_code(code)?;
    let (game, _) = execute(state, &code, &command).await?;
    Ok(snapshot(state, &game))
}

struct Committed<T> {
    game: Game,
    output: T,
    /// Whether a new version was persisted and broadcast.
    written: bool,
}

/// Gated load-apply-write cycle shared by commands and expiry.
///
/// `apply` reports its output and whether it changed the game; on error it
/// must leave the game untouched. An expiry that is due is applied first and
/// persisted even when `apply` then fails. `announce` runs after a successful
/// write, before the snapshot broadcast.
async fn transact<T, F, A>(
    state: &SharedState,
    code: &GameCode,
    mut apply: F,
    announce: A,
) -> Result<Committed<T>, ServiceError>
where
    F: FnMut(&mut Game) -> Result<(T, bool), GameError>,
    A: FnOnce(&Game, &T),
{
    let gate = state.game_gate(code);
    let result = {
        let _guard = gate.lock().await;
        transact_locked(state, code, &mut apply, announce).await
    };
    drop(gate);
    state.prune_gate(code);
    result
}

async fn transact_locked<T, F, A>(
    state: &SharedState,
    code: &GameCode,
    apply: &mut F,
    announce: A,
) -> Result<Committed<T>, ServiceError>
where
    F: FnMut(&mut Game) -> Result<(T, bool), GameError>,
    A: FnOnce(&Game, &T),
{
    let store = state.require_game_store().await?;
    let config = state.config();
    let attempts = config.command_retries.max(1);

    for attempt in 1..=attempts {
        let mut game = load(&store, code).await?;
        let read_version = game.version;
        let now = SystemTime::now();

        let expired = game.expire_if_due(now, config.game_ttl());
        if expired {
            info!(%code, "game expired");
        }
        let applied = apply(&mut game);
        let changed = expired || matches!(applied, Ok((_, true)));

        if !changed {
            let (output, _) = applied?;
            return Ok(Committed {
                game,
                output,
                written: false,
            });
        }

        game.version = read_version + 1;
        game.updated_at = now;
        match store.save_game(game.clone().into(), Some(read_version)).await {
            Ok(()) => {}
            Err(err) if err.is_conflict() => {
                debug!(%code, attempt, "version conflict; retrying command");
                continue;
            }
            Err(err) => {
                warn!(%code, error = %err, "failed to persist game");
                return Err(err.into());
            }
        }

        let applied = match applied {
            Ok((output, _)) => {
                announce(&game, &output);
                Ok(output)
            }
            Err(err) => Err(err),
        };
        sse_events::broadcast_snapshot(state, code, snapshot(state, &game));

        return applied
            .map(|output| Committed {
                game,
                output,
                written: true,
            })
            .map_err(Into::into);
    }

    warn!(%code, attempts, "giving up after repeated version conflicts");
    Err(ServiceError::Conflict(format!(
        "game `{code}` was modified concurrently; try again"
    )))
}

async fn load(store: &Arc<dyn GameStore>, code: &GameCode) -> Result<Game, ServiceError> {
    let entity = store
        .find_game(code.to_string())
        .await
        .inspect_err(|err| warn!(%code, error = %err, "failed to load game"))?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{code}` not found")))?;
    Ok(Game::try_from(entity)?)
}

fn parse_code(code: &str) -> Result<GameCode, ServiceError> {
    GameCode::parse(code).map_err(|err| ServiceError::InvalidInput(err.to_string()))
}

pub(crate) fn snapshot(state: &SharedState, game: &Game) -> GameSnapshot {
    GameSnapshot::build(game, &state.config().scoring_rules(), |id| state.preview(id))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        sync::atomic::{AtomicU32, Ordering},
        time::Duration,
    };

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            game_store::memory::MemoryGameStore,
            models::{GameEntity, GameListItemEntity},
            storage::{StorageError, StorageResult},
        },
        dto::grid::SongInput,
        state::{AppState, state_machine::GameStatus},
    };

    pub(crate) async fn ready_state(config: AppConfig) -> SharedState {
        let state = AppState::new(config);
        state
            .install_game_store(Arc::new(MemoryGameStore::new()))
            .await;
        state
    }

    pub(crate) async fn open_game(state: &SharedState) -> PlayerSessionResponse {
        create_game(
            state,
            CreateGameRequest {
                host_name: " Host ".into(),
                host_avatar: Some("🎤".into()),
                no_duplicates: true,
                allow_late_join: false,
                grid_size: None,
            },
        )
        .await
        .unwrap()
    }

    fn song_input(id: &str) -> SongInput {
        SongInput {
            id: SongId::from(id),
            title: format!("Title {id}"),
            artist: "Artist".into(),
            cover: format!("https://covers.example/{id}.jpg"),
            preview: None,
        }
    }

    async fn assign(state: &SharedState, code: &str, player: Uuid, cell: usize, id: &str) {
        assign_song(
            state,
            code,
            player,
            AssignSongRequest {
                cell_id: format!("cell-{cell}"),
                song: song_input(id),
            },
        )
        .await
        .unwrap();
    }

    async fn mark(state: &SharedState, code: &str, actor: Uuid, id: &str) -> MarkSongResponse {
        mark_song(
            state,
            code,
            MarkSongRequest {
                player_id: actor,
                song_id: SongId::from(id),
                marked: true,
            },
        )
        .await
        .unwrap()
    }

    /// Memory store that rejects the first `conflicts` replacing writes.
    struct ContendedStore {
        inner: MemoryGameStore,
        conflicts: AtomicU32,
    }

    impl GameStore for ContendedStore {
        fn save_game(
            &self,
            game: GameEntity,
            expected_version: Option<u64>,
        ) -> BoxFuture<'static, StorageResult<()>> {
            if expected_version.is_some()
                && self
                    .conflicts
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                let code = game.code.clone();
                return Box::pin(async move { Err(StorageError::conflict(code)) });
            }
            self.inner.save_game(game, expected_version)
        }

        fn find_game(&self, code: String) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
            self.inner.find_game(code)
        }

        fn delete_game(&self, code: String) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_game(code)
        }

        fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>> {
            self.inner.list_games()
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    #[tokio::test]
    async fn create_and_read_game() {
        let state = ready_state(AppConfig::default()).await;
        let session = open_game(&state).await;

        assert_eq!(session.game.status, GameStatus::Lobby);
        assert_eq!(session.game.players.len(), 1);
        assert_eq!(session.game.players[0].name, "Host");
        assert_eq!(session.game.players[0].grid.len(), 16);

        let read = get_game(&state, &session.game.code.to_lowercase()).await.unwrap();
        assert_eq!(read.code, session.game.code);
        assert_eq!(read.host_id, session.player_id);
    }

    #[tokio::test]
    async fn unknown_game_is_not_found() {
        let state = ready_state(AppConfig::default()).await;
        assert!(matches!(
            get_game(&state, "ZZZZZZ").await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            get_game(&state, "nope").await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn oversized_grid_is_rejected() {
        let state = ready_state(AppConfig::default()).await;
        let result = create_game(
            &state,
            CreateGameRequest {
                host_name: "Host".into(),
                host_avatar: None,
                no_duplicates: false,
                allow_late_join: false,
                grid_size: Some(9),
            },
        )
        .await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn degraded_state_refuses_commands() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            get_game(&state, "ABC123").await,
            Err(ServiceError::Degraded)
        ));
    }

    #[tokio::test]
    async fn row_bingo_scores_once_and_broadcasts() {
        let state = ready_state(AppConfig::default()).await;
        let session = open_game(&state).await;
        let code = session.game.code.clone();
        let host = session.player_id;
        let mut events = state
            .sse()
            .hub(&GameCode::parse(&code).unwrap())
            .subscribe();

        for (cell, id) in ["a", "b", "c", "d"].into_iter().enumerate() {
            assign(&state, &code, host, cell, id).await;
        }
        start_game(&state, &code, host).await.unwrap();

        let mut last = None;
        for id in ["c", "a", "d", "b"] {
            last = Some(mark(&state, &code, host, id).await);
        }
        let last = last.unwrap();
        assert!(last.changed);
        assert_eq!(last.players[0].awarded, 100);
        assert_eq!(last.game.players[0].score, 100);
        assert_eq!(last.game.players[0].bingo_count, 1);

        let again = mark(&state, &code, host, "b").await;
        assert!(!again.changed);
        assert_eq!(again.game.version, last.game.version);

        let mut names = Vec::new();
        while let Ok(event) = events.try_recv() {
            names.push(event.event.unwrap_or_default());
        }
        // 4 assigns, start, then 4 marks each followed by a snapshot
        assert_eq!(names.len(), 5 + 4 * 2);
        assert_eq!(names[5], "game.marked");
        assert_eq!(names[6], "game.snapshot");
    }

    #[tokio::test]
    async fn duplicate_song_is_rejected_without_change() {
        let state = ready_state(AppConfig::default()).await;
        let session = open_game(&state).await;
        let code = session.game.code.clone();
        let guest = join_game(
            &state,
            &code,
            JoinGameRequest {
                name: "Guest".into(),
                avatar: None,
            },
        )
        .await
        .unwrap();

        assign(&state, &code, session.player_id, 0, "a").await;
        let before = get_game(&state, &code).await.unwrap();
        let result = assign_song(
            &state,
            &code,
            guest.player_id,
            AssignSongRequest {
                cell_id: "cell-5".into(),
                song: song_input("a"),
            },
        )
        .await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
        let after = get_game(&state, &code).await.unwrap();
        assert_eq!(before.version, after.version);
        assert!(after.players[1].grid.iter().all(|cell| cell.song.is_none()));
    }

    #[tokio::test]
    async fn only_host_drives_lifecycle() {
        let state = ready_state(AppConfig::default()).await;
        let session = open_game(&state).await;
        let code = session.game.code.clone();
        let guest = join_game(
            &state,
            &code,
            JoinGameRequest {
                name: "Guest".into(),
                avatar: None,
            },
        )
        .await
        .unwrap();

        assert!(matches!(
            start_game(&state, &code, guest.player_id).await,
            Err(ServiceError::Forbidden(_))
        ));
        start_game(&state, &code, session.player_id).await.unwrap();
        assert!(matches!(
            join_game(
                &state,
                &code,
                JoinGameRequest {
                    name: "Late".into(),
                    avatar: None,
                },
            )
            .await,
            Err(ServiceError::InvalidState(_))
        ));

        let removed = remove_player(&state, &code, guest.player_id).await.unwrap();
        assert_eq!(removed.players.len(), 1);
        let finished = finish_game(&state, &code, session.player_id).await.unwrap();
        assert_eq!(finished.status, GameStatus::Finished);
    }

    #[tokio::test]
    async fn version_conflicts_are_retried() {
        let state = AppState::new(AppConfig::default());
        state
            .install_game_store(Arc::new(ContendedStore {
                inner: MemoryGameStore::new(),
                conflicts: AtomicU32::new(2),
            }))
            .await;
        let session = open_game(&state).await;

        let snapshot = swap_cells(
            &state,
            &session.game.code,
            session.player_id,
            SwapCellsRequest { a: 0, b: 1 },
        )
        .await
        .unwrap();
        assert_eq!(snapshot.version, session.game.version + 1);
    }

    #[tokio::test]
    async fn exhausted_retries_report_conflict() {
        let state = AppState::new(AppConfig::default());
        state
            .install_game_store(Arc::new(ContendedStore {
                inner: MemoryGameStore::new(),
                conflicts: AtomicU32::new(u32::MAX),
            }))
            .await;
        let session = open_game(&state).await;
        let result = assign_song(
            &state,
            &session.game.code,
            session.player_id,
            AssignSongRequest {
                cell_id: "cell-0".into(),
                song: song_input("a"),
            },
        )
        .await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn expired_games_are_finished_lazily() {
        let state = ready_state(AppConfig {
            game_ttl_hours: 0,
            ..AppConfig::default()
        })
        .await;
        let session = open_game(&state).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        let read = get_game(&state, &session.game.code).await.unwrap();
        assert_eq!(read.status, GameStatus::Finished);
        assert_eq!(read.version, session.game.version + 1);

        let code = GameCode::parse(&session.game.code).unwrap();
        assert!(!expire_game(&state, &code).await.unwrap());
    }

    #[tokio::test]
    async fn refreshed_previews_show_up_in_snapshots() {
        let state = ready_state(AppConfig::default()).await;
        let session = open_game(&state).await;
        let code = session.game.code.clone();
        assign(&state, &code, session.player_id, 0, "42").await;

        refresh_preview(
            &state,
            "42",
            PreviewUpdateRequest {
                preview: Some("https://cdn.example/fresh.mp3".into()),
            },
        )
        .unwrap();

        let read = get_game(&state, &code).await.unwrap();
        let song = read.players[0].grid[0].song.as_ref().unwrap();
        assert_eq!(song.preview.as_deref(), Some("https://cdn.example/fresh.mp3"));
    }
}
