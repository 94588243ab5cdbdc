use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use roomlink_types::api::SendMessageRequest;
use roomlink_types::events::{ChannelCommand, ChannelEvent};
use roomlink_types::models::{Message, PresenceEntry, Room, RoomId, TypingEntry};

use crate::channel::{ChannelManager, ChannelState, ChannelUpdate};
use crate::config::ClientConfig;
use crate::directory::RoomDirectory;
use crate::error::{ClientError, Result};
use crate::event::{EngineEvent, EventQueue};
use crate::history::HistoryFetcher;
use crate::presence::PresenceTracker;
use crate::session::SessionAccessor;
use crate::store::MessageStore;
use crate::transport::Transport;
use crate::typing::TypingCoordinator;

/// What applying one queued event changed. The presentation layer re-reads
/// whatever it shows from [`ChatClient::snapshot`] or the accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    Channel(ChannelState),
    HistoryLoaded { room_id: RoomId, count: usize },
    HistoryFailed { room_id: RoomId, error: String },
    Messages,
    Presence,
    Typing,
    Nothing,
}

/// Copy of everything the presentation layer renders.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub rooms: Vec<Room>,
    pub selected: Option<Room>,
    pub channel_state: ChannelState,
    pub close_reason: Option<String>,
    pub loading_history: bool,
    pub messages: Vec<Message>,
    pub online: Vec<PresenceEntry>,
    pub typing: Vec<TypingEntry>,
}

/// One chat session: owns every component and the event queue they share.
///
/// All mutation goes through `&mut self`, either from a command or from
/// [`handle`](Self::handle) applying a queued event, so nothing here races.
/// Spawned work (history fetches, transport tasks, the typing timer) only
/// ever posts to the queue.
pub struct ChatClient<A: HistoryFetcher, T: Transport> {
    api: Arc<A>,
    session: Arc<dyn SessionAccessor>,
    queue: EventQueue,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    directory: RoomDirectory,
    channel: ChannelManager<T>,
    messages: MessageStore,
    presence: PresenceTracker,
    typing: TypingCoordinator,
    history_pending: Option<RoomId>,
}

impl<A: HistoryFetcher, T: Transport> ChatClient<A, T> {
    pub fn new(config: &ClientConfig, api: A, transport: T, session: Arc<dyn SessionAccessor>) -> Self {
        let (queue, events) = mpsc::unbounded_channel();
        Self {
            api: Arc::new(api),
            session,
            channel: ChannelManager::new(transport, queue.clone()),
            typing: TypingCoordinator::new(queue.clone(), config.typing_debounce),
            queue,
            events,
            directory: RoomDirectory::new(),
            messages: MessageStore::new(),
            presence: PresenceTracker::new(),
            history_pending: None,
        }
    }

    // -- State --

    pub fn rooms(&self) -> &[Room] {
        self.directory.list()
    }

    pub fn selected(&self) -> Option<&Room> {
        self.directory.selected()
    }

    pub fn channel(&self) -> &ChannelManager<T> {
        &self.channel
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    pub fn messages(&self) -> &[Message] {
        self.messages.messages()
    }

    pub fn online(&self) -> &[PresenceEntry] {
        self.presence.entries()
    }

    pub fn typing(&self) -> &[TypingEntry] {
        self.typing.typing()
    }

    pub fn is_loading_history(&self) -> bool {
        self.history_pending.is_some()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            rooms: self.directory.list().to_vec(),
            selected: self.directory.selected().cloned(),
            channel_state: self.channel.state(),
            close_reason: self.channel.close_reason().map(str::to_string),
            loading_history: self.is_loading_history(),
            messages: self.messages.messages().to_vec(),
            online: self.presence.entries().to_vec(),
            typing: self.typing.typing().to_vec(),
        }
    }

    // -- Rooms --

    pub async fn refresh_rooms(&mut self) -> Result<()> {
        let rooms = self.api.list_rooms().await?;
        debug!("Room list refreshed: {} rooms", rooms.len());
        if self.directory.set_rooms(rooms) {
            info!("Selected room is gone from the room list, deselecting");
            self.select_room(None);
        }
        Ok(())
    }

    pub async fn create_room(
        &mut self,
        name: &str,
        description: Option<&str>,
        is_private: bool,
    ) -> Result<Room> {
        let req = RoomDirectory::validate_new_room(name, description, is_private)?;
        let room = self.api.create_room(req).await?;
        info!("Created room {} ({})", room.name, room.id);
        self.directory.upsert(room.clone());
        Ok(room)
    }

    pub async fn join_room(&mut self, room_id: RoomId) -> Result<()> {
        self.api.join_room(room_id).await?;
        info!("Joined room {}", room_id);
        self.refresh_rooms().await
    }

    pub async fn leave_room(&mut self, room_id: RoomId) -> Result<()> {
        self.api.leave_room(room_id).await?;
        info!("Left room {}", room_id);
        if self.directory.is_selected(room_id) {
            self.select_room(None);
        }
        self.refresh_rooms().await
    }

    /// Select a room from the current list by id.
    pub fn select_room_id(&mut self, room_id: RoomId) -> Result<()> {
        let room = self
            .directory
            .get(room_id)
            .cloned()
            .ok_or_else(|| ClientError::Validation(format!("unknown room {}", room_id)))?;
        self.select_room(Some(room));
        Ok(())
    }

    /// Switch the active room. The old channel is closed before the new one
    /// is opened, and all per-room state is dropped.
    pub fn select_room(&mut self, room: Option<Room>) {
        self.typing.cancel();
        self.typing.clear();

        let Some(room) = room else {
            if let Some(previous) = self.directory.selected_id() {
                info!("Leaving room {}", previous);
            }
            self.channel.deactivate();
            self.directory.select(None);
            self.messages.clear();
            self.presence.reset(Vec::new());
            self.history_pending = None;
            return;
        };

        let room_id = room.id;
        info!("Selecting room {} ({})", room.name, room_id);
        self.directory.select(Some(room));
        self.messages.reset(room_id);

        match self.session.credentials() {
            Some(credentials) => {
                self.typing.set_local_username(Some(credentials.user.username.clone()));
                self.channel.activate(room_id, &credentials);
            }
            None => self.channel.fail(room_id, ClientError::NotSignedIn.to_string()),
        }

        self.fetch_history(room_id);
        self.presence.reset(Vec::new());
    }

    /// Caller-driven recovery: reopen the channel for the selected room after
    /// it closed. Returns `false` if there is nothing to reconnect.
    pub fn reconnect(&mut self) -> bool {
        if self.channel.state() != ChannelState::Closed {
            return false;
        }
        match self.directory.selected().cloned() {
            Some(room) => {
                info!("Reconnecting to room {}", room.id);
                self.select_room(Some(room));
                true
            }
            None => false,
        }
    }

    pub fn shutdown(&mut self) {
        self.select_room(None);
    }

    fn fetch_history(&mut self, room_id: RoomId) {
        self.history_pending = Some(room_id);
        let api = Arc::clone(&self.api);
        let queue = self.queue.clone();
        tokio::spawn(async move {
            let result = api.fetch_messages(room_id).await;
            let _ = queue.send(EngineEvent::History { room_id, result });
        });
    }

    // -- Messages and typing --

    /// Send a message to the selected room. Goes over the channel when it is
    /// open, in which case the message shows up when the server echoes it
    /// and `None` is returned. Otherwise it is posted over HTTP and the
    /// created message is stored and returned.
    pub async fn send_message(&mut self, content: &str) -> Result<Option<Message>> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ClientError::Validation("message is empty".into()));
        }
        let room_id = self
            .directory
            .selected_id()
            .ok_or_else(|| ClientError::Validation("no room selected".into()))?;

        if let Some(stop) = self.typing.stop() {
            let _ = self.channel.send(&stop);
        }

        let command = ChannelCommand::Message {
            content: content.to_string(),
            room_id,
        };
        if self.channel.send(&command).is_ok() {
            return Ok(None);
        }

        debug!("Channel {} not open, posting message over HTTP", self.channel.state());
        let message = self
            .api
            .send_message(SendMessageRequest {
                content: content.to_string(),
                room_id,
            })
            .await?;
        self.messages.append(message.clone());
        Ok(Some(message))
    }

    /// The local input box changed.
    pub fn input_changed(&mut self) {
        let Some(room_id) = self.directory.selected_id() else {
            return;
        };
        if let Some(start) = self.typing.input_changed(room_id) {
            match self.channel.send(&start) {
                Ok(()) => self.typing.start_sent(room_id),
                Err(_) => debug!("Typing start not sent, channel {}", self.channel.state()),
            }
        }
    }

    // -- Event queue --

    /// Wait for the next queued event and apply it.
    pub async fn next_update(&mut self) -> Update {
        match self.events.recv().await {
            Some(event) => self.handle(event),
            None => Update::Nothing,
        }
    }

    /// Apply a queued event if one is ready, without waiting.
    pub fn try_update(&mut self) -> Option<Update> {
        self.events.try_recv().ok().map(|event| self.handle(event))
    }

    pub fn handle(&mut self, event: EngineEvent) -> Update {
        match event {
            EngineEvent::Transport { conn, event } => match self.channel.on_transport_event(conn, event) {
                ChannelUpdate::Stale | ChannelUpdate::Dropped => Update::Nothing,
                ChannelUpdate::StateChanged(state) => {
                    // Nothing is known about who is online or typing once
                    // the channel is gone.
                    if state == ChannelState::Closed {
                        self.typing.cancel();
                        self.typing.clear();
                        self.presence.reset(Vec::new());
                    }
                    Update::Channel(state)
                }
                ChannelUpdate::Event(event) => self.dispatch(event),
            },
            EngineEvent::History { room_id, result } => self.apply_history(room_id, result),
            EngineEvent::TypingTimer { generation } => {
                if let Some(stop) = self.typing.timer_fired(generation) {
                    if self.channel.send(&stop).is_err() {
                        debug!("Typing stop not sent, channel {}", self.channel.state());
                    }
                }
                Update::Nothing
            }
        }
    }

    fn apply_history(&mut self, room_id: RoomId, result: Result<Vec<Message>>) -> Update {
        if !self.directory.is_selected(room_id) {
            debug!("Discarding history for room {}, no longer selected", room_id);
            return Update::Nothing;
        }
        if self.history_pending == Some(room_id) {
            self.history_pending = None;
        }

        match result {
            Ok(history) => {
                self.messages.load_history(room_id, history);
                Update::HistoryLoaded {
                    room_id,
                    count: self.messages.len(),
                }
            }
            Err(e) => {
                warn!("Failed to load history for room {}: {}", room_id, e);
                Update::HistoryFailed {
                    room_id,
                    error: e.to_string(),
                }
            }
        }
    }

    fn dispatch(&mut self, event: ChannelEvent) -> Update {
        let Some(room_id) = self.channel.room_id() else {
            return Update::Nothing;
        };

        if let ChannelEvent::Message { .. } = event {
            return match event.into_message(room_id) {
                Some(message) => {
                    if self.messages.append(message) {
                        Update::Messages
                    } else {
                        Update::Nothing
                    }
                }
                None => Update::Nothing,
            };
        }

        let presence_changed = self.presence.apply(&event);
        let typing_changed = self.typing.apply(&event);
        if presence_changed {
            Update::Presence
        } else if typing_changed {
            Update::Typing
        } else {
            Update::Nothing
        }
    }
}

impl<A: HistoryFetcher, T: Transport> Drop for ChatClient<A, T> {
    fn drop(&mut self) {
        self.channel.deactivate();
        self.typing.cancel();
    }
}
