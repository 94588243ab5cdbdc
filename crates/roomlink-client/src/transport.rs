use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};
use url::Url;

use roomlink_types::models::RoomId;

use crate::event::{ConnectionId, EngineEvent, EventQueue, TransportEvent};

/// Where a transport reports what happens on one connection. Each sink is
/// stamped with the connection id it was created for.
#[derive(Debug, Clone)]
pub struct EventSink {
    conn: ConnectionId,
    queue: EventQueue,
}

impl EventSink {
    pub(crate) fn new(conn: ConnectionId, queue: EventQueue) -> Self {
        Self { conn, queue }
    }

    pub fn connection(&self) -> ConnectionId {
        self.conn
    }

    /// Returns `false` once the engine is gone.
    pub fn opened(&self) -> bool {
        self.post(TransportEvent::Opened)
    }

    pub fn frame(&self, text: impl Into<String>) -> bool {
        self.post(TransportEvent::Frame(text.into()))
    }

    pub fn closed(&self, reason: Option<String>) -> bool {
        self.post(TransportEvent::Closed { reason })
    }

    fn post(&self, event: TransportEvent) -> bool {
        self.queue
            .send(EngineEvent::Transport {
                conn: self.conn,
                event,
            })
            .is_ok()
    }
}

/// Write side of an open connection, owned by the channel manager.
#[derive(Debug)]
pub struct ChannelHandle {
    outbound: mpsc::UnboundedSender<String>,
    task: Option<AbortHandle>,
}

impl ChannelHandle {
    /// `outbound` carries encoded frames to the connection task; dropping it
    /// asks the task to close. `task`, when given, is aborted if the handle
    /// is closed before the connection opened.
    pub fn new(outbound: mpsc::UnboundedSender<String>, task: Option<AbortHandle>) -> Self {
        Self { outbound, task }
    }

    pub(crate) fn send(&self, text: String) -> bool {
        self.outbound.send(text).is_ok()
    }

    pub(crate) fn close(self, force: bool) {
        let Self { outbound, task } = self;
        drop(outbound);
        if force {
            if let Some(task) = task {
                task.abort();
            }
        }
    }
}

/// Opens push connections. Implementations must report through the given
/// sink only; they never touch engine state directly.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, room_id: RoomId, token: &str, sink: EventSink) -> ChannelHandle;
}

/// [`Transport`] over WebSocket: `{base}/ws/{room_id}?token=...`.
pub struct WsTransport {
    base_url: String,
    heartbeat: Duration,
}

impl WsTransport {
    pub fn new(base_url: impl Into<String>, heartbeat: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            heartbeat,
        }
    }

    fn room_url(&self, room_id: RoomId, token: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("{}/ws/{}", self.base_url, room_id))?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url)
    }
}

impl Transport for WsTransport {
    fn open(&self, room_id: RoomId, token: &str, sink: EventSink) -> ChannelHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let url = match self.room_url(room_id, token) {
            Ok(url) => url,
            Err(e) => {
                warn!("Bad channel URL for room {}: {}", room_id, e);
                sink.closed(Some(format!("invalid channel url: {}", e)));
                return ChannelHandle::new(outbound_tx, None);
            }
        };

        let task = tokio::spawn(run_connection(url, sink, outbound_rx, self.heartbeat));
        ChannelHandle::new(outbound_tx, Some(task.abort_handle()))
    }
}

/// Connection loop: forwards outbound frames, relays inbound text frames,
/// and pings on an interval. Two intervals without a pong drop the
/// connection.
async fn run_connection(
    url: Url,
    sink: EventSink,
    mut outbound: mpsc::UnboundedReceiver<String>,
    heartbeat_interval: Duration,
) {
    let conn = sink.connection();
    let (stream, _) = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok(ok) => ok,
        Err(e) => {
            warn!("Channel {} failed to connect: {}", conn, e);
            sink.closed(Some(e.to_string()));
            return;
        }
    };

    info!("Channel {} connected to {}", conn, url.path());
    if !sink.opened() {
        return;
    }

    let (mut sender, mut receiver) = stream.split();
    let mut heartbeat = tokio::time::interval(heartbeat_interval);
    heartbeat.tick().await;
    let mut pong_received = true;
    let mut missed_heartbeats: u8 = 0;

    let reason = loop {
        tokio::select! {
            cmd = outbound.recv() => match cmd {
                Some(text) => {
                    if let Err(e) = sender.send(Message::Text(text.into())).await {
                        break Some(e.to_string());
                    }
                }
                None => {
                    debug!("Channel {} closed by owner", conn);
                    let _ = sender.send(Message::Close(None)).await;
                    break None;
                }
            },
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    pong_received = true;
                    if !sink.frame(text.as_str()) {
                        break None;
                    }
                }
                Some(Ok(Message::Pong(_))) => pong_received = true,
                Some(Ok(Message::Close(_))) | None => break None,
                Some(Ok(_)) => {}
                Some(Err(e)) => break Some(e.to_string()),
            },
            _ = heartbeat.tick() => {
                if pong_received {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= 2 {
                        break Some(format!("heartbeat timeout (missed {} pongs)", missed_heartbeats));
                    }
                }
                pong_received = false;
                trace!("Channel {} ping", conn);
                if let Err(e) = sender.send(Message::Ping(Vec::new().into())).await {
                    break Some(e.to_string());
                }
            }
        }
    };

    match &reason {
        Some(reason) => warn!("Channel {} dropped: {}", conn, reason),
        None => info!("Channel {} closed", conn),
    }
    sink.closed(reason);
}
