//! Process-wide session event bus.
//!
//! A typed publish/subscribe channel owned by the session layer, replacing
//! ambient global dispatch. The bus carries a single payloadless event,
//! "token updated", which is a pure invalidation signal: subscribers
//! re-read current state themselves rather than trusting event data.
//!
//! Delivery is at-least-once per live subscriber, with no ordering guarantee
//! between subscribers and no replay for late joiners; a subscriber that
//! mounts late must poll current state once itself.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Channel capacity. Events are invalidation signals, so a small buffer is
/// enough; an overrun subscriber observes a single coalesced event.
const DEFAULT_CAPACITY: usize = 16;

/// Events carried by the session bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The stored session token changed (saved or cleared). Carries no
    /// payload; re-read the store.
    TokenUpdated,
}

/// The session event bus. Cheap to clone; all clones share one channel.
#[derive(Clone)]
pub struct SessionBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionBus {
    /// Create a new bus with no subscribers.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self { tx }
    }

    /// Announce that the stored token changed.
    ///
    /// Having no live subscribers is not an error.
    pub fn broadcast_token_updated(&self) {
        let receivers = self.tx.receiver_count();
        tracing::debug!(receivers, "broadcasting token update");
        let _ = self.tx.send(SessionEvent::TokenUpdated);
    }

    /// Subscribe to future events. Dropping the returned handle tears the
    /// subscription down.
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SessionBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription to the session bus.
pub struct SessionSubscription {
    rx: broadcast::Receiver<SessionEvent>,
}

impl SessionSubscription {
    /// Wait for the next event. Returns `None` once the bus is gone.
    ///
    /// A lagged subscriber gets a single coalesced `TokenUpdated`; the
    /// event is an invalidation signal, so missed intermediate events carry
    /// no information.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        match self.rx.recv().await {
            Ok(event) => Some(event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "session bus subscriber lagged, coalescing");
                Some(SessionEvent::TokenUpdated)
            }
            Err(RecvError::Closed) => None,
        }
    }

    /// Non-blocking receive. Returns `None` when no event is pending.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Lagged(_)) => Some(SessionEvent::TokenUpdated),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivers_to_all_subscribers() {
        let bus = SessionBus::new();
        let mut sub_a = bus.subscribe();
        let mut sub_b = bus.subscribe();

        bus.broadcast_token_updated();

        assert_eq!(sub_a.recv().await, Some(SessionEvent::TokenUpdated));
        assert_eq!(sub_b.recv().await, Some(SessionEvent::TokenUpdated));
    }

    #[tokio::test]
    async fn test_no_replay_for_late_joiners() {
        let bus = SessionBus::new();
        bus.broadcast_token_updated();

        let mut late = bus.subscribe();
        assert_eq!(late.try_recv(), None);

        bus.broadcast_token_updated();
        assert_eq!(late.recv().await, Some(SessionEvent::TokenUpdated));
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_fine() {
        let bus = SessionBus::new();
        bus.broadcast_token_updated();
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_tears_down_subscription() {
        let bus = SessionBus::new();
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_coalesces() {
        let bus = SessionBus::new();
        let mut sub = bus.subscribe();

        for _ in 0..(DEFAULT_CAPACITY + 8) {
            bus.broadcast_token_updated();
        }

        // First receive surfaces the overrun as one coalesced invalidation.
        assert_eq!(sub.recv().await, Some(SessionEvent::TokenUpdated));
    }
}
