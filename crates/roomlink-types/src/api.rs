use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Message, MessageId, RoomId, UserId};
use crate::timestamp;

// -- Rooms --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub description: Option<String>,
    pub is_private: bool,
}

/// Plain acknowledgement body returned by join/leave.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub message: String,
}

// -- Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    pub room_id: RoomId,
}

/// Author block embedded in every message response. The server sends more
/// account fields (email, flags); only identity is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorResponse {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: MessageId,
    pub content: String,
    pub room_id: RoomId,
    pub user_id: UserId,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    pub user: AuthorResponse,
}

impl From<MessageResponse> for Message {
    fn from(resp: MessageResponse) -> Self {
        Self {
            id: resp.id,
            room_id: resp.room_id,
            author_user_id: resp.user_id,
            author_username: resp.user.username,
            content: resp.content,
            created_at: resp.created_at,
        }
    }
}

// -- Errors --

/// Error body attached to non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}
