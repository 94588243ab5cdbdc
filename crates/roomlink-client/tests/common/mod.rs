//! In-memory stand-ins for the HTTP API and the push transport, so the
//! engine can be driven step by step without a server.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use tokio::sync::{Semaphore, mpsc};

use roomlink_client::{
    ChannelHandle, ChatClient, ClientConfig, ClientError, EventSink, HistoryFetcher, Result,
    StaticSession, Transport, Update,
};
use roomlink_types::api::{CreateRoomRequest, SendMessageRequest};
use roomlink_types::events::ChannelCommand;
use roomlink_types::models::{Message, MessageId, Room, RoomId, User};

pub const LOCAL_USER: &str = "me";

pub fn room(id: RoomId, name: &str) -> Room {
    Room {
        id,
        name: name.into(),
        description: None,
        is_private: false,
        created_by: None,
        created_at: None,
    }
}

pub fn message(id: MessageId, room_id: RoomId) -> Message {
    Message {
        id,
        room_id,
        author_user_id: 2,
        author_username: "ann".into(),
        content: format!("message {id}"),
        created_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
    }
}

/// Channel frame for `message`, as the server pushes it.
pub fn message_frame(message: &Message) -> String {
    serde_json::json!({
        "type": "message",
        "id": message.id,
        "content": message.content,
        "username": message.author_username,
        "user_id": message.author_user_id,
        "created_at": message.created_at.to_rfc3339(),
    })
    .to_string()
}

pub fn ids(messages: &[Message]) -> Vec<MessageId> {
    messages.iter().map(|m| m.id).collect()
}

// -- API --

#[derive(Default)]
struct ApiState {
    rooms: Mutex<Vec<Room>>,
    history: Mutex<HashMap<RoomId, Vec<Message>>>,
    gates: Mutex<HashMap<RoomId, Arc<Semaphore>>>,
    fail_create: Mutex<Option<(u16, String)>>,
    fail_history: Mutex<HashMap<RoomId, (u16, String)>>,
    create_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    next_message_id: AtomicI64,
    sent: Mutex<Vec<SendMessageRequest>>,
}

#[derive(Clone, Default)]
pub struct FakeApi {
    state: Arc<ApiState>,
}

impl FakeApi {
    pub fn new(rooms: Vec<Room>) -> Self {
        let api = Self::default();
        *api.state.rooms.lock().unwrap() = rooms;
        api.state.next_message_id.store(1000, Ordering::SeqCst);
        api
    }

    pub fn set_rooms(&self, rooms: Vec<Room>) {
        *self.state.rooms.lock().unwrap() = rooms;
    }

    pub fn set_history(&self, room_id: RoomId, messages: Vec<Message>) {
        self.state.history.lock().unwrap().insert(room_id, messages);
    }

    /// Make fetches for `room_id` wait until [`release`](Self::release).
    pub fn hold(&self, room_id: RoomId) {
        self.state
            .gates
            .lock()
            .unwrap()
            .insert(room_id, Arc::new(Semaphore::new(0)));
    }

    /// Let one held fetch for `room_id` complete.
    pub fn release(&self, room_id: RoomId) {
        if let Some(gate) = self.state.gates.lock().unwrap().get(&room_id) {
            gate.add_permits(1);
        }
    }

    pub fn fail_create(&self, status: u16, detail: &str) {
        *self.state.fail_create.lock().unwrap() = Some((status, detail.into()));
    }

    /// Make fetches for `room_id` answer with a server error.
    pub fn fail_history(&self, room_id: RoomId, status: u16, detail: &str) {
        self.state
            .fail_history
            .lock()
            .unwrap()
            .insert(room_id, (status, detail.into()));
    }

    pub fn create_calls(&self) -> usize {
        self.state.create_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<SendMessageRequest> {
        self.state.sent.lock().unwrap().clone()
    }
}

impl HistoryFetcher for FakeApi {
    async fn list_rooms(&self) -> Result<Vec<Room>> {
        Ok(self.state.rooms.lock().unwrap().clone())
    }

    async fn create_room(&self, req: CreateRoomRequest) -> Result<Room> {
        self.state.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some((status, detail)) = self.state.fail_create.lock().unwrap().clone() {
            return Err(ClientError::Server { status, detail });
        }
        let mut rooms = self.state.rooms.lock().unwrap();
        let created = Room {
            id: rooms.iter().map(|r| r.id).max().unwrap_or(0) + 1,
            name: req.name,
            description: req.description,
            is_private: req.is_private,
            created_by: Some(1),
            created_at: None,
        };
        rooms.push(created.clone());
        Ok(created)
    }

    async fn join_room(&self, room_id: RoomId) -> Result<()> {
        let known = self.state.rooms.lock().unwrap().iter().any(|r| r.id == room_id);
        if known {
            Err(ClientError::Server {
                status: 400,
                detail: "Already a member of this room".into(),
            })
        } else {
            self.state.rooms.lock().unwrap().push(room(room_id, "joined"));
            Ok(())
        }
    }

    async fn leave_room(&self, room_id: RoomId) -> Result<()> {
        self.state.rooms.lock().unwrap().retain(|r| r.id != room_id);
        Ok(())
    }

    async fn fetch_messages(&self, room_id: RoomId) -> Result<Vec<Message>> {
        self.state.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.state.gates.lock().unwrap().get(&room_id).cloned();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        let failure = self.state.fail_history.lock().unwrap().get(&room_id).cloned();
        if let Some((status, detail)) = failure {
            return Err(ClientError::Server { status, detail });
        }
        Ok(self
            .state
            .history
            .lock()
            .unwrap()
            .get(&room_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(&self, req: SendMessageRequest) -> Result<Message> {
        self.state.sent.lock().unwrap().push(req.clone());
        let id = self.state.next_message_id.fetch_add(1, Ordering::SeqCst);
        Ok(Message {
            id,
            room_id: req.room_id,
            author_user_id: 1,
            author_username: LOCAL_USER.into(),
            content: req.content,
            created_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
        })
    }
}

// -- Transport --

pub struct FakeConnection {
    pub room_id: RoomId,
    pub token: String,
    sink: EventSink,
    outbound: mpsc::UnboundedReceiver<String>,
    sent: Vec<String>,
    closed: bool,
}

impl FakeConnection {
    fn drain(&mut self) {
        loop {
            match self.outbound.try_recv() {
                Ok(text) => self.sent.push(text),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeTransport {
    connections: Arc<Mutex<Vec<FakeConnection>>>,
}

impl FakeTransport {
    pub fn count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    pub fn room_of(&self, conn: usize) -> RoomId {
        self.connections.lock().unwrap()[conn].room_id
    }

    pub fn token_of(&self, conn: usize) -> String {
        self.connections.lock().unwrap()[conn].token.clone()
    }

    /// Report the connection as established.
    pub fn open(&self, conn: usize) {
        self.connections.lock().unwrap()[conn].sink.opened();
    }

    /// Deliver an inbound text frame.
    pub fn push(&self, conn: usize, frame: impl Into<String>) {
        self.connections.lock().unwrap()[conn].sink.frame(frame);
    }

    /// Report the connection as dropped by the remote side.
    pub fn drop_remote(&self, conn: usize, reason: &str) {
        self.connections.lock().unwrap()[conn]
            .sink
            .closed(Some(reason.to_string()));
    }

    /// Whether the engine still holds the write side of `conn`.
    pub fn is_live(&self, conn: usize) -> bool {
        let mut connections = self.connections.lock().unwrap();
        connections[conn].drain();
        !connections[conn].closed
    }

    pub fn live_count(&self) -> usize {
        (0..self.count()).filter(|&c| self.is_live(c)).count()
    }

    /// Commands written to `conn` since the last call.
    pub fn take_sent(&self, conn: usize) -> Vec<ChannelCommand> {
        let mut connections = self.connections.lock().unwrap();
        connections[conn].drain();
        connections[conn]
            .sent
            .drain(..)
            .map(|text| serde_json::from_str(&text).unwrap())
            .collect()
    }
}

impl Transport for FakeTransport {
    fn open(&self, room_id: RoomId, token: &str, sink: EventSink) -> ChannelHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.lock().unwrap().push(FakeConnection {
            room_id,
            token: token.to_string(),
            sink,
            outbound: rx,
            sent: Vec::new(),
            closed: false,
        });
        ChannelHandle::new(tx, None)
    }
}

// -- Client --

pub type TestClient = ChatClient<FakeApi, FakeTransport>;

pub fn local_user() -> User {
    User {
        id: 1,
        username: LOCAL_USER.into(),
    }
}

pub async fn client(rooms: Vec<Room>) -> (TestClient, FakeApi, FakeTransport) {
    let api = FakeApi::new(rooms);
    let transport = FakeTransport::default();
    let session = Arc::new(StaticSession::new(local_user(), "secret-token"));
    let mut client = ChatClient::new(
        &ClientConfig::default(),
        api.clone(),
        transport.clone(),
        session,
    );
    client.refresh_rooms().await.unwrap();
    (client, api, transport)
}

/// Let spawned tasks run and apply everything they queued. Never waits on
/// the clock, so paused-time tests stay in control of it.
pub async fn settle(client: &mut TestClient) -> Vec<Update> {
    let mut updates = Vec::new();
    for _ in 0..16 {
        tokio::task::yield_now().await;
        while let Some(update) = client.try_update() {
            updates.push(update);
        }
    }
    updates
}
