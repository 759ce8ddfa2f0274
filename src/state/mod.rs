pub mod code;
pub mod commands;
pub mod game;
pub mod grid;
pub mod lines;
pub mod replica;
pub mod scoring;
mod sse;
pub mod state_machine;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};

use crate::{
    config::AppConfig,
    dao::game_store::GameStore,
    error::ServiceError,
    state::{code::GameCode, grid::SongId},
};

pub use self::sse::{SseHub, SseHubs};

pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, per-game gates and broadcast hubs.
pub struct AppState {
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    config: AppConfig,
    sse: SseHubs,
    gates: DashMap<GameCode, Arc<Mutex<()>>>,
    previews: DashMap<SongId, String>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            game_store: RwLock::new(None),
            sse: SseHubs::new(config.sse_capacity),
            config,
            gates: DashMap::new(),
            previews: DashMap::new(),
            degraded: degraded_tx,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current game store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn install_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current game store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        {
            let mut guard = self.game_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.game_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Per-game broadcast hubs.
    pub fn sse(&self) -> &SseHubs {
        &self.sse
    }

    /// Gate serializing commands addressed to `code` within this process.
    pub fn game_gate(&self, code: &GameCode) -> Arc<Mutex<()>> {
        self.gates.entry(code.clone()).or_default().clone()
    }

    /// Forget the gate of `code` when no command holds it.
    pub fn prune_gate(&self, code: &GameCode) {
        self.gates
            .remove_if(code, |_, gate| Arc::strong_count(gate) == 1);
    }

    /// Latest known preview URL for a song; upstream preview links expire.
    pub fn preview(&self, song_id: &SongId) -> Option<String> {
        self.previews.get(song_id).map(|entry| entry.value().clone())
    }

    /// Record (or with `None`, forget) the refreshed preview URL of a song.
    pub fn set_preview(&self, song_id: SongId, url: Option<String>) {
        match url {
            Some(url) => {
                self.previews.insert(song_id, url);
            }
            None => {
                self.previews.remove(&song_id);
            }
        }
    }

    /// Update and broadcast the degraded flag when the value changes.
    fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}
