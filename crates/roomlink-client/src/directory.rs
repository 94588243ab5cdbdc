use roomlink_types::api::CreateRoomRequest;
use roomlink_types::models::{Room, RoomId};

use crate::error::{ClientError, Result};

const MAX_ROOM_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 500;

/// The room list and the current selection.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: Vec<Room>,
    selected: Option<Room>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> &[Room] {
        &self.rooms
    }

    pub fn get(&self, room_id: RoomId) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == room_id)
    }

    pub fn selected(&self) -> Option<&Room> {
        self.selected.as_ref()
    }

    pub fn selected_id(&self) -> Option<RoomId> {
        self.selected.as_ref().map(|r| r.id)
    }

    pub fn is_selected(&self, room_id: RoomId) -> bool {
        self.selected_id() == Some(room_id)
    }

    pub fn select(&mut self, room: Option<Room>) {
        self.selected = room;
    }

    /// Replace the list with a fresh fetch. Returns `true` if the selected
    /// room is no longer in it.
    pub fn set_rooms(&mut self, rooms: Vec<Room>) -> bool {
        self.rooms = rooms;
        match self.selected_id() {
            Some(id) => self.get(id).is_none(),
            None => false,
        }
    }

    /// Add or update one room, keeping list order.
    pub fn upsert(&mut self, room: Room) {
        match self.rooms.iter_mut().find(|r| r.id == room.id) {
            Some(existing) => *existing = room,
            None => self.rooms.push(room),
        }
    }

    /// Build a create request, rejecting input the server would refuse.
    pub fn validate_new_room(
        name: &str,
        description: Option<&str>,
        is_private: bool,
    ) -> Result<CreateRoomRequest> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::Validation("room name is required".into()));
        }
        if name.chars().count() > MAX_ROOM_NAME_LEN {
            return Err(ClientError::Validation(format!(
                "room name must be at most {} characters",
                MAX_ROOM_NAME_LEN
            )));
        }
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        if description.as_ref().is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN) {
            return Err(ClientError::Validation(format!(
                "description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }

        Ok(CreateRoomRequest {
            name: name.to_string(),
            description,
            is_private,
        })
    }
}
