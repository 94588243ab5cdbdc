use tracing::debug;

use roomlink_types::events::ChannelEvent;
use roomlink_types::models::{PresenceEntry, UserId};

/// Who is connected to the active room.
///
/// A `room_users` snapshot is authoritative and replaces everything gathered
/// from joins and leaves so far. A join or leave that raced the snapshot can
/// leave the set stale until the next snapshot.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    entries: Vec<PresenceEntry>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[PresenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.entries.iter().any(|e| e.user_id == user_id)
    }

    pub fn reset(&mut self, entries: Vec<PresenceEntry>) {
        self.entries.clear();
        for entry in entries {
            self.add(entry);
        }
    }

    /// Returns `false` if the user was already present.
    pub fn add(&mut self, entry: PresenceEntry) -> bool {
        if self.contains(entry.user_id) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn remove(&mut self, user_id: UserId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.user_id != user_id);
        self.entries.len() != before
    }

    /// Apply a channel event. Returns whether membership changed.
    pub fn apply(&mut self, event: &ChannelEvent) -> bool {
        match event {
            ChannelEvent::RoomUsers { users } => {
                debug!("Presence snapshot: {} users", users.len());
                self.reset(users.clone());
                true
            }
            ChannelEvent::UserJoined { user_id, username } => self.add(PresenceEntry {
                user_id: *user_id,
                username: username.clone(),
            }),
            ChannelEvent::UserLeft { user_id, .. } => self.remove(*user_id),
            _ => false,
        }
    }
}
