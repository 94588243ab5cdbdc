use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type RoomId = i64;
pub type MessageId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub created_by: Option<UserId>,
    #[serde(default, deserialize_with = "crate::timestamp::deserialize_option")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A chat message as the client holds it, whether it came from the history
/// endpoint or was pushed over the room channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub author_user_id: UserId,
    pub author_username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One user connected to the active room's channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingEntry {
    pub username: String,
}
