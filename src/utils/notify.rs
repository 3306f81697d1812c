//! Fire-and-forget notifications toward external frontends.
//!
//! Moderation and session changes publish a [`FrontendEvent`] so
//! observers (an admin panel, a web status page) can refresh cached
//! views. Publishing never blocks and never fails: with no subscribers
//! the event is simply dropped.

use tokio::sync::broadcast;

/// What changed, and for which user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontendEvent {
    pub kind: FrontendEventKind,
    /// UID the event concerns, when it concerns one.
    pub uid: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendEventKind {
    /// Persisted data for a UID changed; cached views should reload it.
    UserInfoUpdated,
    /// A session entered the live table.
    SessionStarted,
    /// A session left the live table.
    SessionEnded,
}

/// Publish side of the frontend notification channel.
///
/// Cloning shares the underlying channel. Slow subscribers lose old
/// events rather than applying backpressure to the server.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<FrontendEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. A send with no live receivers is not an error.
    pub fn publish(&self, event: FrontendEvent) {
        let _ = self.sender.send(event);
    }

    pub fn user_info_updated(&self, uid: &str) {
        self.publish(FrontendEvent {
            kind: FrontendEventKind::UserInfoUpdated,
            uid: Some(uid.to_string()),
        });
    }

    pub fn session_started(&self, uid: &str) {
        self.publish(FrontendEvent {
            kind: FrontendEventKind::SessionStarted,
            uid: Some(uid.to_string()),
        });
    }

    pub fn session_ended(&self, uid: &str) {
        self.publish(FrontendEvent {
            kind: FrontendEventKind::SessionEnded,
            uid: Some(uid.to_string()),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FrontendEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}
