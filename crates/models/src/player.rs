use crate::join_request::PLAYER_ACCOUNT_TYPE;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Storage partition a player record was found in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlayerSource {
    /// Dedicated player profiles; every row is a player
    Players,
    /// Shared account table; rows carry their own account type
    Users,
}

impl PlayerSource {
    pub fn table_name(&self) -> &'static str {
        match self {
            PlayerSource::Players => "players",
            PlayerSource::Users => "users",
        }
    }

    pub fn is_player_only(&self) -> bool {
        matches!(self, PlayerSource::Players)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlayerRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub account_type: String,
    pub profile: serde_json::Value,
}

/// Player record tagged with the partition it came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerLookup {
    pub source: PlayerSource,
    pub record: PlayerRecord,
}

impl PlayerLookup {
    pub fn is_player(&self) -> bool {
        self.source.is_player_only()
            || self
                .record
                .account_type
                .eq_ignore_ascii_case(PLAYER_ACCOUNT_TYPE)
    }
}
