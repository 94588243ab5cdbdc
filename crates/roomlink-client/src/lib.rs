//! Client-side synchronization engine for room-based chat.
//!
//! [`ChatClient`] ties together the room list, a single push channel bound
//! to the selected room, the merged message sequence, presence, and typing
//! indicators. The request/response API and the push transport sit behind
//! the [`HistoryFetcher`] and [`Transport`] traits; [`HttpHistoryFetcher`]
//! and [`WsTransport`] are the network implementations.

pub mod channel;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod event;
pub mod history;
pub mod presence;
pub mod session;
pub mod store;
pub mod transport;
pub mod typing;

pub use channel::{ChannelManager, ChannelState};
pub use config::ClientConfig;
pub use engine::{ChatClient, Snapshot, Update};
pub use error::{ClientError, NotOpenError, Result};
pub use history::{HistoryFetcher, HttpHistoryFetcher};
pub use session::{Credentials, SessionAccessor, StaticSession};
pub use transport::{ChannelHandle, EventSink, Transport, WsTransport};
