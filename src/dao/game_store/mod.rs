#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{GameEntity, GameListItemEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the persistence layer for bingo games.
///
/// Writes are guarded by the entity `version`: `expected_version` is `None`
/// when creating a game (fails if the code is taken) and `Some(v)` when
/// replacing a game that was read at version `v`. The stored entity is the one
/// passed in, whose version the caller already bumped. A mismatch yields
/// [`StorageError::VersionConflict`](crate::dao::storage::StorageError::VersionConflict).
pub trait GameStore: Send + Sync {
    fn save_game(
        &self,
        game: GameEntity,
        expected_version: Option<u64>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn find_game(&self, code: String) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    fn delete_game(&self, code: String) -> BoxFuture<'static, StorageResult<bool>>;
    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
