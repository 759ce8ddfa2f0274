use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dao::models::{
    GameEntity, GameListItemEntity, GameSettingsEntity, GameStatusEntity, PlayerEntity,
};

pub const GAME_PREFIX: &str = "game::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub game: GameBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameBody {
    pub code: String,
    pub host_id: Uuid,
    pub status: GameStatusEntity,
    pub settings: GameSettingsEntity,
    pub players: Vec<PlayerEntity>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    pub version: u64,
}

impl From<(GameEntity, Option<String>)> for CouchGameDocument {
    fn from((game, rev): (GameEntity, Option<String>)) -> Self {
        Self {
            id: game_doc_id(&game.code),
            rev,
            game: GameBody {
                code: game.code,
                host_id: game.host_id,
                status: game.status,
                settings: game.settings,
                players: game.players,
                created_at: game.created_at,
                updated_at: game.updated_at,
                version: game.version,
            },
        }
    }
}

impl From<CouchGameDocument> for GameEntity {
    fn from(doc: CouchGameDocument) -> Self {
        let body = doc.game;
        Self {
            code: body.code,
            host_id: body.host_id,
            status: body.status,
            settings: body.settings,
            players: body.players,
            created_at: body.created_at,
            updated_at: body.updated_at,
            version: body.version,
        }
    }
}

impl From<&CouchGameDocument> for GameListItemEntity {
    fn from(doc: &CouchGameDocument) -> Self {
        Self {
            code: doc.game.code.clone(),
            status: doc.game.status,
            created_at: doc.game.created_at,
            updated_at: doc.game.updated_at,
            player_count: doc.game.players.len(),
        }
    }
}

pub fn game_doc_id(code: &str) -> String {
    format!("{}{}", GAME_PREFIX, code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_is_prefixed_code() {
        assert_eq!(game_doc_id("ABC123"), "game::ABC123");
    }

    #[test]
    fn document_flattens_the_body_next_to_couch_keys() {
        let entity = GameEntity {
            code: "ABC123".into(),
            host_id: Uuid::nil(),
            status: GameStatusEntity::Playing,
            settings: GameSettingsEntity {
                no_duplicates: true,
                allow_late_join: false,
                grid_size: 4,
            },
            players: Vec::new(),
            created_at: SystemTime::UNIX_EPOCH,
            updated_at: SystemTime::UNIX_EPOCH,
            version: 7,
        };

        let doc = CouchGameDocument::from((entity.clone(), Some("3-abc".into())));
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["_id"], "game::ABC123");
        assert_eq!(json["_rev"], "3-abc");
        assert_eq!(json["status"], "playing");
        assert_eq!(json["version"], 7);

        let decoded: CouchGameDocument = serde_json::from_value(json).unwrap();
        assert_eq!(GameEntity::from(decoded), entity);
    }
}
