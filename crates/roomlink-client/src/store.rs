use std::collections::HashSet;

use tracing::debug;

use roomlink_types::models::{Message, MessageId, RoomId};

/// Ordered, de-duplicated messages for the active room.
///
/// Order is arrival order. The server assigns the canonical order and the
/// client never re-sorts; the only job here is to keep each id once.
#[derive(Debug, Default)]
pub struct MessageStore {
    room_id: Option<RoomId>,
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_id(&self) -> Option<RoomId> {
        self.room_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.ids.contains(&id)
    }

    /// Bind to `room_id` with an empty sequence.
    pub fn reset(&mut self, room_id: RoomId) {
        self.clear();
        self.room_id = Some(room_id);
    }

    /// Drop everything and unbind.
    pub fn clear(&mut self) {
        self.room_id = None;
        self.messages.clear();
        self.ids.clear();
    }

    /// Install the fetched backlog for `room_id`.
    ///
    /// For a different room this is a plain replace. For the bound room the
    /// history goes first and any messages already held that the history
    /// does not contain are kept after it, in the order they arrived, so a
    /// live message that raced ahead of the fetch is not lost.
    pub fn load_history(&mut self, room_id: RoomId, history: Vec<Message>) {
        let live = if self.room_id == Some(room_id) {
            std::mem::take(&mut self.messages)
        } else {
            Vec::new()
        };
        self.reset(room_id);

        let fetched = history.len();
        for message in history.into_iter().chain(live) {
            self.push_unique(message);
        }
        debug!(
            "Room {} history loaded: {} fetched, {} held",
            room_id,
            fetched,
            self.messages.len()
        );
    }

    /// Add one message. Returns `false` when it is a duplicate or belongs to
    /// another room.
    pub fn append(&mut self, message: Message) -> bool {
        if self.room_id != Some(message.room_id) {
            return false;
        }
        self.push_unique(message)
    }

    fn push_unique(&mut self, message: Message) -> bool {
        if !self.ids.insert(message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }
}
