use std::future::Future;
use std::sync::Arc;

use reqwest::{Client, Method, RequestBuilder, Response};
use tracing::{debug, warn};

use roomlink_types::api::{
    CreateRoomRequest, ErrorBody, MessageResponse, SendMessageRequest, StatusResponse,
};
use roomlink_types::models::{Message, Room, RoomId};

use crate::error::{ClientError, Result};
use crate::session::SessionAccessor;

/// Request/response side of the chat API.
///
/// Every call is independent; nothing here touches engine state. Futures are
/// `Send` so the engine can run them on spawned tasks.
pub trait HistoryFetcher: Send + Sync + 'static {
    fn list_rooms(&self) -> impl Future<Output = Result<Vec<Room>>> + Send;

    fn create_room(&self, req: CreateRoomRequest) -> impl Future<Output = Result<Room>> + Send;

    fn join_room(&self, room_id: RoomId) -> impl Future<Output = Result<()>> + Send;

    fn leave_room(&self, room_id: RoomId) -> impl Future<Output = Result<()>> + Send;

    /// Backlog for one room, oldest first.
    fn fetch_messages(&self, room_id: RoomId) -> impl Future<Output = Result<Vec<Message>>> + Send;

    fn send_message(&self, req: SendMessageRequest) -> impl Future<Output = Result<Message>> + Send;
}

/// [`HistoryFetcher`] over HTTP with bearer-token auth.
pub struct HttpHistoryFetcher {
    client: Client,
    base_url: String,
    session: Arc<dyn SessionAccessor>,
}

impl HttpHistoryFetcher {
    pub fn new(base_url: impl Into<String>, session: Arc<dyn SessionAccessor>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let credentials = self.session.credentials().ok_or(ClientError::NotSignedIn)?;
        Ok(self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", credentials.token)))
    }
}

/// Turn a non-2xx response into `ClientError::Server`, preferring the
/// `detail` field of the error body when there is one.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(err) => err.detail,
        Err(_) if !body.is_empty() => body,
        Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
    };
    warn!("API error {}: {}", status.as_u16(), detail);
    Err(ClientError::Server {
        status: status.as_u16(),
        detail,
    })
}

impl HistoryFetcher for HttpHistoryFetcher {
    async fn list_rooms(&self) -> Result<Vec<Room>> {
        let resp = self.request(Method::GET, "/rooms/")?.send().await?;
        let rooms: Vec<Room> = check(resp).await?.json().await?;
        debug!("Fetched {} rooms", rooms.len());
        Ok(rooms)
    }

    async fn create_room(&self, req: CreateRoomRequest) -> Result<Room> {
        let resp = self.request(Method::POST, "/rooms/")?.json(&req).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn join_room(&self, room_id: RoomId) -> Result<()> {
        let path = format!("/rooms/{}/join", room_id);
        let resp = self.request(Method::POST, &path)?.send().await?;
        let status: StatusResponse = check(resp).await?.json().await?;
        debug!("Joined room {}: {}", room_id, status.message);
        Ok(())
    }

    async fn leave_room(&self, room_id: RoomId) -> Result<()> {
        let path = format!("/rooms/{}/leave", room_id);
        let resp = self.request(Method::DELETE, &path)?.send().await?;
        let status: StatusResponse = check(resp).await?.json().await?;
        debug!("Left room {}: {}", room_id, status.message);
        Ok(())
    }

    async fn fetch_messages(&self, room_id: RoomId) -> Result<Vec<Message>> {
        let path = format!("/messages/room/{}", room_id);
        let resp = self.request(Method::GET, &path)?.send().await?;
        let messages: Vec<MessageResponse> = check(resp).await?.json().await?;
        Ok(messages.into_iter().map(Message::from).collect())
    }

    async fn send_message(&self, req: SendMessageRequest) -> Result<Message> {
        let resp = self.request(Method::POST, "/messages/")?.json(&req).send().await?;
        let message: MessageResponse = check(resp).await?.json().await?;
        Ok(message.into())
    }
}
