use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;

use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, GameListItemEntity},
    storage::{StorageError, StorageResult},
};

/// Process-local [`GameStore`] used for development and tests.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    games: Arc<DashMap<String, GameEntity>>,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn save(&self, game: GameEntity, expected_version: Option<u64>) -> StorageResult<()> {
        match (self.games.entry(game.code.clone()), expected_version) {
            (Entry::Vacant(slot), None) => {
                slot.insert(game);
                Ok(())
            }
            (Entry::Occupied(mut slot), Some(expected)) if slot.get().version == expected => {
                slot.insert(game);
                Ok(())
            }
            _ => Err(StorageError::conflict(game.code)),
        }
    }
}

impl GameStore for MemoryGameStore {
    fn save_game(
        &self,
        game: GameEntity,
        expected_version: Option<u64>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.save(game, expected_version);
        Box::pin(async move { result })
    }

    fn find_game(&self, code: String) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let game = self.games.get(&code).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(game) })
    }

    fn delete_game(&self, code: String) -> BoxFuture<'static, StorageResult<bool>> {
        let removed = self.games.remove(&code).is_some();
        Box::pin(async move { Ok(removed) })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>> {
        let items = self
            .games
            .iter()
            .map(|entry| GameListItemEntity::from(entry.value()))
            .collect();
        Box::pin(async move { Ok(items) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use uuid::Uuid;

    use super::*;
    use crate::dao::models::{GameSettingsEntity, GameStatusEntity};

    fn entity(code: &str, version: u64) -> GameEntity {
        GameEntity {
            code: code.into(),
            host_id: Uuid::nil(),
            status: GameStatusEntity::Lobby,
            settings: GameSettingsEntity {
                no_duplicates: false,
                allow_late_join: false,
                grid_size: 4,
            },
            players: Vec::new(),
            created_at: SystemTime::UNIX_EPOCH,
            updated_at: SystemTime::UNIX_EPOCH,
            version,
        }
    }

    #[tokio::test]
    async fn create_then_find() {
        let store = MemoryGameStore::new();
        store.save_game(entity("ABC123", 0), None).await.unwrap();

        let found = store.find_game("ABC123".into()).await.unwrap();
        assert_eq!(found, Some(entity("ABC123", 0)));
        assert!(store.find_game("ZZZ999".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn creating_a_taken_code_conflicts() {
        let store = MemoryGameStore::new();
        store.save_game(entity("ABC123", 0), None).await.unwrap();
        let err = store.save_game(entity("ABC123", 0), None).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = MemoryGameStore::new();
        store.save_game(entity("ABC123", 0), None).await.unwrap();
        store.save_game(entity("ABC123", 1), Some(0)).await.unwrap();

        let err = store
            .save_game(entity("ABC123", 1), Some(0))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(
            store.find_game("ABC123".into()).await.unwrap().unwrap().version,
            1
        );
    }

    #[tokio::test]
    async fn updating_a_missing_game_conflicts() {
        let store = MemoryGameStore::new();
        let err = store
            .save_game(entity("ABC123", 1), Some(0))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn list_and_delete() {
        let store = MemoryGameStore::new();
        store.save_game(entity("AAAAAA", 0), None).await.unwrap();
        store.save_game(entity("BBBBBB", 0), None).await.unwrap();

        let mut codes: Vec<_> = store
            .list_games()
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.code)
            .collect();
        codes.sort();
        assert_eq!(codes, vec!["AAAAAA", "BBBBBB"]);

        assert!(store.delete_game("AAAAAA".into()).await.unwrap());
        assert!(!store.delete_game("AAAAAA".into()).await.unwrap());
    }
}
