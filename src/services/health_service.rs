use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether a storage backend is installed, pinging it on the way.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let storage = state.config().storage.name();
    match state.require_game_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(storage, error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!(storage, "storage unavailable (degraded mode)"),
    }

    if state.is_degraded().await {
        HealthResponse::degraded(storage)
    } else {
        HealthResponse::ok(storage)
    }
}
