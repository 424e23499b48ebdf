//! Broadcast bus for distributing `SessionEvent` to the presentation layer.
//!
//! Built on `tokio::sync::broadcast`, the `SessionBus` supports multiple
//! concurrent subscribers (display, logger, tests). Publishing with no
//! active subscribers is a no-op, so the orchestration core never depends
//! on a listener being attached.

use tokio::sync::broadcast;

use visor_types::event::SessionEvent;

/// Multi-consumer bus for session and pipeline-stage events.
///
/// Wraps a `tokio::sync::broadcast` channel. Cloning the bus clones the
/// sender, allowing multiple producers and consumers.
pub struct SessionBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// Silently dropped when nobody is listening.
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }

    /// Shorthand for publishing a user-visible error.
    pub fn publish_error(&self, message: impl Into<String>) {
        self.publish(SessionEvent::Error {
            message: message.into(),
        });
    }
}

impl Default for SessionBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Clone for SessionBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for SessionBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
