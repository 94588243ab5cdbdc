use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Message, MessageId, PresenceEntry, RoomId, UserId};
use crate::timestamp;

/// Events pushed by the server over a room channel.
///
/// The channel is already scoped to one room, so none of the payloads repeat
/// the room id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// A message was posted to the room
    Message {
        id: MessageId,
        content: String,
        username: String,
        user_id: UserId,
        #[serde(deserialize_with = "timestamp::deserialize")]
        created_at: DateTime<Utc>,
    },

    /// Another user connected to the room
    UserJoined { user_id: UserId, username: String },

    /// A user disconnected from the room
    UserLeft { user_id: UserId, username: String },

    /// Full snapshot of who is connected, sent right after connecting
    RoomUsers { users: Vec<PresenceEntry> },

    /// Someone started or stopped typing
    Typing { username: String, is_typing: bool },
}

impl ChannelEvent {
    /// Decode a text frame. Unknown `type` values and malformed payloads are
    /// both reported as errors; callers drop them.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Turns a pushed message into the stored model, bound to the room the
    /// channel was opened for. Returns `None` for every other event.
    pub fn into_message(self, room_id: RoomId) -> Option<Message> {
        match self {
            Self::Message {
                id,
                content,
                username,
                user_id,
                created_at,
            } => Some(Message {
                id,
                room_id,
                author_user_id: user_id,
                author_username: username,
                content,
                created_at,
            }),
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over the room channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelCommand {
    /// Post a message to the room
    Message { content: String, room_id: RoomId },

    /// Start or stop the typing indicator
    Typing { is_typing: bool, room_id: RoomId },
}

impl ChannelCommand {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
