use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

use roomlink_types::events::{ChannelCommand, ChannelEvent};
use roomlink_types::models::{RoomId, TypingEntry};

use crate::event::{EngineEvent, EventQueue};

/// The single pending debounce timer. Dropping it cancels it.
#[derive(Debug)]
struct TypingTimer {
    generation: u64,
    task: JoinHandle<()>,
}

impl Drop for TypingTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Both halves of the typing indicator.
///
/// Outgoing: the first keystroke sends `typing:true`, every keystroke
/// restarts one debounce timer, and the timer firing after a quiet period
/// sends `typing:false`. Incoming: `typing` events from other users maintain
/// the set of who is typing. Entries have no timeout of their own; a lost
/// stop event leaves the name in place until the user leaves or the room
/// changes.
#[derive(Debug)]
pub struct TypingCoordinator {
    queue: EventQueue,
    delay: Duration,
    local_username: Option<String>,
    armed_room: Option<RoomId>,
    timer: Option<TypingTimer>,
    generation: u64,
    typing: Vec<TypingEntry>,
}

impl TypingCoordinator {
    pub fn new(queue: EventQueue, delay: Duration) -> Self {
        Self {
            queue,
            delay,
            local_username: None,
            armed_room: None,
            timer: None,
            generation: 0,
            typing: Vec::new(),
        }
    }

    /// Name whose own typing events are never shown.
    pub fn set_local_username(&mut self, username: Option<String>) {
        self.local_username = username;
    }

    pub fn is_armed(&self) -> bool {
        self.armed_room.is_some()
    }

    pub fn has_pending_timer(&self) -> bool {
        self.timer.is_some()
    }

    pub fn typing(&self) -> &[TypingEntry] {
        &self.typing
    }

    // -- Outgoing --

    /// Local input changed in `room_id`. Returns `typing:true` while no
    /// start has gone out for this run; the debounce timer restarts either
    /// way. The run only counts as started once the caller reports the
    /// command delivered through [`start_sent`](Self::start_sent).
    pub fn input_changed(&mut self, room_id: RoomId) -> Option<ChannelCommand> {
        self.restart_timer();
        if self.armed_room == Some(room_id) {
            return None;
        }
        Some(ChannelCommand::Typing {
            is_typing: true,
            room_id,
        })
    }

    /// The `typing:true` for `room_id` reached the channel.
    pub fn start_sent(&mut self, room_id: RoomId) {
        self.armed_room = Some(room_id);
    }

    /// The debounce timer tagged `generation` fired. Returns `typing:false`
    /// if it is still the pending timer.
    pub fn timer_fired(&mut self, generation: u64) -> Option<ChannelCommand> {
        match &self.timer {
            Some(timer) if timer.generation == generation => {}
            _ => {
                trace!("Ignoring superseded typing timer {}", generation);
                return None;
            }
        }
        self.timer = None;
        self.disarm()
    }

    /// End the typing run now, e.g. because the message was sent.
    pub fn stop(&mut self) -> Option<ChannelCommand> {
        self.timer = None;
        self.disarm()
    }

    /// Cancel the timer and forget the typing run without emitting anything,
    /// for when the channel is going away.
    pub fn cancel(&mut self) {
        self.timer = None;
        self.armed_room = None;
    }

    fn disarm(&mut self) -> Option<ChannelCommand> {
        self.armed_room.take().map(|room_id| ChannelCommand::Typing {
            is_typing: false,
            room_id,
        })
    }

    fn restart_timer(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let queue = self.queue.clone();
        let deadline = tokio::time::Instant::now() + self.delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = queue.send(EngineEvent::TypingTimer { generation });
        });
        // Replacing the old timer drops and aborts it.
        self.timer = Some(TypingTimer { generation, task });
    }

    // -- Incoming --

    /// Apply a channel event. Returns whether the typing set changed.
    pub fn apply(&mut self, event: &ChannelEvent) -> bool {
        match event {
            ChannelEvent::Typing { username, is_typing } => {
                if self.local_username.as_deref() == Some(username.as_str()) {
                    return false;
                }
                if *is_typing {
                    if self.typing.iter().any(|e| &e.username == username) {
                        return false;
                    }
                    self.typing.push(TypingEntry {
                        username: username.clone(),
                    });
                    true
                } else {
                    self.remove(username)
                }
            }
            ChannelEvent::UserLeft { username, .. } => self.remove(username),
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.typing.clear();
    }

    fn remove(&mut self, username: &str) -> bool {
        let before = self.typing.len();
        self.typing.retain(|e| e.username != username);
        self.typing.len() != before
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    fn coordinator() -> (TypingCoordinator, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut typing = TypingCoordinator::new(tx, Duration::from_millis(1000));
        typing.set_local_username(Some("me".into()));
        (typing, rx)
    }

    fn typing_event(username: &str, is_typing: bool) -> ChannelEvent {
        ChannelEvent::Typing {
            username: username.into(),
            is_typing,
        }
    }

    fn names(typing: &TypingCoordinator) -> Vec<&str> {
        typing.typing().iter().map(|e| e.username.as_str()).collect()
    }

    #[test]
    fn never_lists_local_user() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut typing = TypingCoordinator::new(tx, Duration::from_millis(1000));
        typing.set_local_username(Some("me".into()));
        assert!(!typing.apply(&typing_event("me", true)));
        assert!(typing.apply(&typing_event("ann", true)));
        assert!(!typing.apply(&typing_event("ann", true)));
        assert!(!typing.apply(&typing_event("me", false)));
        assert_eq!(names(&typing), vec!["ann"]);

        assert!(typing.apply(&typing_event("ann", false)));
        assert!(typing.typing().is_empty());
    }

    #[test]
    fn entry_persists_without_stop_until_leave() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut typing = TypingCoordinator::new(tx, Duration::from_millis(1000));
        typing.apply(&typing_event("ann", true));
        typing.apply(&typing_event("bo", true));
        // No expiry: only a stop, a leave or a clear removes it.
        typing.apply(&ChannelEvent::UserLeft { user_id: 2, username: "bo".into() });
        assert_eq!(names(&typing), vec!["ann"]);
        typing.clear();
        assert!(typing.typing().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn first_keystroke_arms_and_timer_disarms() {
        let (mut typing, mut rx) = coordinator();
        assert_eq!(
            typing.input_changed(3),
            Some(ChannelCommand::Typing { is_typing: true, room_id: 3 })
        );
        typing.start_sent(3);
        assert_eq!(typing.input_changed(3), None);
        assert!(typing.is_armed());

        let generation = match rx.recv().await {
            Some(EngineEvent::TypingTimer { generation }) => generation,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(
            typing.timer_fired(generation),
            Some(ChannelCommand::Typing { is_typing: false, room_id: 3 })
        );
        assert!(!typing.is_armed());
        assert!(!typing.has_pending_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_generation_is_ignored() {
        let (mut typing, _rx) = coordinator();
        typing.input_changed(3);
        typing.start_sent(3);
        typing.input_changed(3);
        assert_eq!(typing.timer_fired(1), None);
        assert!(typing.is_armed());
        assert!(typing.timer_fired(2).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn undelivered_start_is_offered_again() {
        let (mut typing, mut rx) = coordinator();
        assert!(typing.input_changed(3).is_some());
        assert!(!typing.is_armed());
        assert!(typing.input_changed(3).is_some());

        // The quiet period ends without a start ever going out: no stop either.
        let generation = match rx.recv().await {
            Some(EngineEvent::TypingTimer { generation }) => generation,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(typing.timer_fired(generation), None);
        assert!(!typing.has_pending_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_pending_timer() {
        let (mut typing, mut rx) = coordinator();
        typing.input_changed(3);
        typing.cancel();
        assert!(!typing.is_armed());

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_emits_false_only_when_armed() {
        let (mut typing, _rx) = coordinator();
        assert_eq!(typing.stop(), None);
        typing.input_changed(9);
        typing.start_sent(9);
        assert_eq!(
            typing.stop(),
            Some(ChannelCommand::Typing { is_typing: false, room_id: 9 })
        );
        assert_eq!(typing.stop(), None);
    }
}
