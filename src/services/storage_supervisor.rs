use std::{future::Future, sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{task::JoinHandle, time::sleep};
use tracing::{info, warn};

use crate::{
    config::StorageBackend,
    dao::{
        game_store::{GameStore, memory::MemoryGameStore},
        storage::StorageError,
    },
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Raised when the configured backend was left out of the build.
#[derive(Debug, Error)]
#[error("storage backend `{0:?}` is not compiled in")]
pub struct BackendNotCompiled(pub StorageBackend);

/// Start supervising the backend selected in the configuration.
pub fn spawn(state: SharedState) -> Result<JoinHandle<()>, BackendNotCompiled> {
    let backend = state.config().storage;
    info!(storage = backend.name(), "starting storage supervisor");

    match backend {
        StorageBackend::Memory => {
            // One instance for the whole process; reconnecting must not lose games.
            let store = MemoryGameStore::new();
            Ok(tokio::spawn(run(state, move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn GameStore>) }
            })))
        }
        #[cfg(feature = "mongo-store")]
        StorageBackend::Mongo => {
            use crate::dao::game_store::mongodb::{MongoConfig, MongoGameStore};

            Ok(tokio::spawn(run(state, || async {
                let config = MongoConfig::from_env().await?;
                let store = MongoGameStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn GameStore>)
            })))
        }
        #[cfg(feature = "couch-store")]
        StorageBackend::Couch => {
            use crate::dao::game_store::couchdb::{CouchConfig, CouchGameStore};

            Ok(tokio::spawn(run(state, || async {
                let config = CouchConfig::from_env()?;
                let store = CouchGameStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn GameStore>)
            })))
        }
        #[allow(unreachable_patterns)]
        other => Err(BackendNotCompiled(other)),
    }
}

/// Reconnect to the storage backend and keep the shared state in degraded mode
/// while it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn GameStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_game_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                loop {
                    match store.health_check().await {
                        Ok(()) => sleep(HEALTH_POLL_INTERVAL).await,
                        Err(err) => {
                            warn!(
                                error = %err,
                                "storage health check failed; entering degraded mode"
                            );
                            state.clear_game_store().await;

                            if reconnect(store.as_ref()).await {
                                state.install_game_store(store.clone()).await;
                                info!("storage reconnected; leaving degraded mode");
                                sleep(HEALTH_POLL_INTERVAL).await;
                                continue;
                            }
                            warn!("exhausted storage reconnect attempts; staying in degraded mode");
                            break;
                        }
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

async fn reconnect(store: &dyn GameStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => return true,
            Err(err) => {
                warn!(attempt, error = %err, "storage reconnect attempt failed");
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[tokio::test]
    async fn memory_backend_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();
        let handle = spawn(state.clone()).unwrap();

        watcher.changed().await.unwrap();
        assert!(!*watcher.borrow());
        assert!(state.require_game_store().await.is_ok());
        handle.abort();
    }

    #[tokio::test]
    async fn failed_connections_keep_retrying() {
        let state = AppState::new(AppConfig::default());
        let attempts = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counter = attempts.clone();
        let handle = tokio::spawn(run(state.clone(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Err::<Arc<dyn GameStore>, _>(StorageError::unavailable(
                    "down".into(),
                    std::io::Error::other("down"),
                ))
            }
        }));

        sleep(Duration::from_millis(1_500)).await;
        assert!(attempts.load(std::sync::atomic::Ordering::SeqCst) >= 2);
        assert!(state.is_degraded().await);
        handle.abort();
    }
}
