use tokio::sync::mpsc;

use roomlink_types::models::{Message, RoomId};

use crate::error::ClientError;

/// Identifies one transport connection. A fresh id is minted on every
/// activation, so anything tagged with an older id is known to be stale.
pub type ConnectionId = u64;

/// What a transport reports about its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    /// A text frame, still undecoded.
    Frame(String),
    /// The connection ended. `reason` is `None` for an orderly close.
    Closed { reason: Option<String> },
}

/// Everything that can mutate engine state arrives as one of these, through
/// one queue, and is applied in arrival order.
#[derive(Debug)]
pub enum EngineEvent {
    Transport {
        conn: ConnectionId,
        event: TransportEvent,
    },
    History {
        room_id: RoomId,
        result: Result<Vec<Message>, ClientError>,
    },
    TypingTimer {
        generation: u64,
    },
}

pub type EventQueue = mpsc::UnboundedSender<EngineEvent>;
