use std::time::SystemTime;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::{
    dao::models::GameStatusEntity,
    error::ServiceError,
    services::game_service,
    state::{SharedState, code::GameCode},
};

/// Periodically finish games that outlived their time to live and delete
/// finished games past their retention window.
pub async fn run(state: SharedState) {
    let mut ticker = interval(state.config().expiry_sweep_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match sweep(&state).await {
            Ok(0) | Err(ServiceError::Degraded) => {}
            Ok(expired) => info!(expired, "expired stale games"),
            Err(err) => warn!(error = %err, "expiry sweep failed"),
        }
        match purge(&state).await {
            Ok(0) | Err(ServiceError::Degraded) => {}
            Ok(purged) => info!(purged, "purged finished games"),
            Err(err) => warn!(error = %err, "purge sweep failed"),
        }
    }
}

/// Expire every due game once. Returns how many were finished by this sweep.
pub async fn sweep(state: &SharedState) -> Result<usize, ServiceError> {
    let store = state.require_game_store().await?;
    let now = SystemTime::now();
    let ttl = state.config().game_ttl();

    let due: Vec<GameCode> = store
        .list_games()
        .await?
        .into_iter()
        .filter(|item| item.status != GameStatusEntity::Finished)
        .filter(|item| now.duration_since(item.created_at).is_ok_and(|age| age >= ttl))
        .filter_map(|item| GameCode::parse(&item.code).ok())
        .collect();

    let mut expired = 0;
    for code in due {
        match game_service::expire_game(state, &code).await {
            Ok(true) => expired += 1,
            Ok(false) | Err(ServiceError::NotFound(_)) => {}
            Err(err) => warn!(%code, error = %err, "failed to expire game"),
        }
    }
    Ok(expired)
}

/// Delete finished games untouched for longer than the retention window.
pub async fn purge(state: &SharedState) -> Result<usize, ServiceError> {
    let store = state.require_game_store().await?;
    let Some(cutoff) = SystemTime::now().checked_sub(state.config().finished_retention()) else {
        return Ok(0);
    };

    let stale: Vec<GameCode> = store
        .list_games()
        .await?
        .into_iter()
        .filter(|item| item.status == GameStatusEntity::Finished && item.updated_at <= cutoff)
        .filter_map(|item| GameCode::parse(&item.code).ok())
        .collect();

    let mut purged = 0;
    for code in stale {
        match game_service::purge_game(state, &code, cutoff).await {
            Ok(true) => purged += 1,
            Ok(false) | Err(ServiceError::NotFound(_)) => {}
            Err(err) => warn!(%code, error = %err, "failed to purge game"),
        }
    }
    Ok(purged)
}
