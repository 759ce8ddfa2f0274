use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    GameEntity, GameListItemEntity, GameSettingsEntity, GameStatusEntity, PlayerEntity,
};

/// Game stored as a single document keyed by its join code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    code: String,
    host_id: Uuid,
    status: GameStatusEntity,
    settings: GameSettingsEntity,
    players: Vec<PlayerEntity>,
    created_at: DateTime,
    updated_at: DateTime,
    version: i64,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            code: value.code,
            host_id: value.host_id,
            status: value.status,
            settings: value.settings,
            players: value.players,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
            version: version_to_bson(value.version),
        }
    }
}

impl From<MongoGameDocument> for GameEntity {
    fn from(value: MongoGameDocument) -> Self {
        Self {
            code: value.code,
            host_id: value.host_id,
            status: value.status,
            settings: value.settings,
            players: value.players,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
            version: value.version.max(0) as u64,
        }
    }
}

impl From<&MongoGameDocument> for GameListItemEntity {
    fn from(value: &MongoGameDocument) -> Self {
        Self {
            code: value.code.clone(),
            status: value.status,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
            player_count: value.players.len(),
        }
    }
}

pub fn version_to_bson(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

pub fn doc_id(code: &str) -> Document {
    doc! {"_id": code}
}

/// Filter matching the game only while it is still at `version`.
pub fn versioned_doc_id(code: &str, version: u64) -> Document {
    doc! {"_id": code, "version": version_to_bson(version)}
}
