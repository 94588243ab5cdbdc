use std::fmt;

use tracing::{debug, info, trace, warn};

use roomlink_types::events::{ChannelCommand, ChannelEvent};
use roomlink_types::models::RoomId;

use crate::error::NotOpenError;
use crate::event::{ConnectionId, EventQueue, TransportEvent};
use crate::session::Credentials;
use crate::transport::{ChannelHandle, EventSink, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What a transport event meant for the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelUpdate {
    /// The event belonged to a connection that is no longer current.
    Stale,
    StateChanged(ChannelState),
    Event(ChannelEvent),
    /// A frame that did not decode, or arrived while not open.
    Dropped,
}

/// Owns the single live push connection and its state machine:
/// `Idle -> Connecting -> Open -> Closed`.
///
/// Only events stamped with the current connection id are let through, so a
/// connection that was replaced can never feed the new room.
pub struct ChannelManager<T: Transport> {
    transport: T,
    queue: EventQueue,
    state: ChannelState,
    room_id: Option<RoomId>,
    handle: Option<ChannelHandle>,
    conn: ConnectionId,
    close_reason: Option<String>,
}

impl<T: Transport> ChannelManager<T> {
    pub fn new(transport: T, queue: EventQueue) -> Self {
        Self {
            transport,
            queue,
            state: ChannelState::Idle,
            room_id: None,
            handle: None,
            conn: 0,
            close_reason: None,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Room the channel is bound to. Set while connecting or open, and kept
    /// after a transport-side close so the caller knows what to reconnect.
    pub fn room_id(&self) -> Option<RoomId> {
        self.room_id
    }

    pub fn connection(&self) -> ConnectionId {
        self.conn
    }

    pub fn close_reason(&self) -> Option<&str> {
        self.close_reason.as_deref()
    }

    /// Open a channel for `room_id`, tearing down whatever was there first.
    pub fn activate(&mut self, room_id: RoomId, credentials: &Credentials) {
        if self.state != ChannelState::Idle {
            self.deactivate();
        }

        self.conn += 1;
        self.room_id = Some(room_id);
        self.close_reason = None;
        self.state = ChannelState::Connecting;
        info!("Channel {} connecting to room {}", self.conn, room_id);

        let sink = EventSink::new(self.conn, self.queue.clone());
        self.handle = Some(self.transport.open(room_id, &credentials.token, sink));
    }

    /// Bind to `room_id` without a connection, for when there are no
    /// credentials to open one with.
    pub fn fail(&mut self, room_id: RoomId, reason: impl Into<String>) {
        if self.state != ChannelState::Idle {
            self.deactivate();
        }
        let reason = reason.into();
        warn!("Channel for room {} not opened: {}", room_id, reason);
        self.conn += 1;
        self.room_id = Some(room_id);
        self.close_reason = Some(reason);
        self.state = ChannelState::Closed;
    }

    /// Close the current connection, if any, and unbind the room.
    pub fn deactivate(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Channel {} closing ({})", self.conn, self.state);
            handle.close(self.state == ChannelState::Connecting);
        }
        if self.state != ChannelState::Idle {
            self.state = ChannelState::Closed;
        }
        self.room_id = None;
    }

    /// Queue a command on the open channel.
    pub fn send(&self, command: &ChannelCommand) -> Result<(), NotOpenError> {
        let handle = match (&self.handle, self.state) {
            (Some(handle), ChannelState::Open) => handle,
            _ => return Err(NotOpenError),
        };
        let text = command.encode().map_err(|e| {
            warn!("Failed to encode channel command: {}", e);
            NotOpenError
        })?;
        if handle.send(text) {
            Ok(())
        } else {
            Err(NotOpenError)
        }
    }

    /// Apply one transport event. Events for any connection but the current
    /// one are ignored.
    pub fn on_transport_event(&mut self, conn: ConnectionId, event: TransportEvent) -> ChannelUpdate {
        if conn != self.conn || self.handle.is_none() {
            trace!("Ignoring event from stale channel {} (current {})", conn, self.conn);
            return ChannelUpdate::Stale;
        }

        match event {
            TransportEvent::Opened => {
                if self.state != ChannelState::Connecting {
                    return ChannelUpdate::Dropped;
                }
                self.state = ChannelState::Open;
                info!("Channel {} open for room {:?}", conn, self.room_id);
                ChannelUpdate::StateChanged(ChannelState::Open)
            }
            TransportEvent::Frame(text) => {
                if self.state != ChannelState::Open {
                    return ChannelUpdate::Dropped;
                }
                match ChannelEvent::decode(&text) {
                    Ok(event) => ChannelUpdate::Event(event),
                    Err(e) => {
                        let raw: String = text.chars().take(200).collect();
                        trace!("Dropping frame on channel {}: {} -- raw: {}", conn, e, raw);
                        ChannelUpdate::Dropped
                    }
                }
            }
            TransportEvent::Closed { reason } => {
                self.handle = None;
                self.state = ChannelState::Closed;
                match &reason {
                    Some(reason) => warn!("Channel {} closed: {}", conn, reason),
                    None => info!("Channel {} closed by server", conn),
                }
                self.close_reason = reason;
                ChannelUpdate::StateChanged(ChannelState::Closed)
            }
        }
    }
}
