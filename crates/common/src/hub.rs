//! Live viewer registry.
//!
//! ```text
//!                    NotificationHub (cheap clone)
//!               ┌───────────────────────────────┐
//!               │ feeds: name -> FeedSockets {  │
//!               │   [Connection { id, tx }, ..] │
//!               │ }                             │
//!               └───────────────┬───────────────┘
//!                               │ broadcast(feed, event)
//!            ┌──────────────────┼──────────────────┐
//!            ▼                  ▼                  ▼
//!       [Listener]         [Listener]         [Listener]
//!       ws task            ws task            ws task
//! ```
//!
//! Every connection gets its own bounded queue of [`VIEWER_QUEUE_DEPTH`]
//! events, so a slow socket never stalls a broadcast. Within one feed,
//! broadcasts are serialized by the feed's socket list lock and each
//! connection receives events in broadcast order. A connection whose queue is
//! closed or full is dropped from the registry during the broadcast; its
//! listener drains what was already queued and then sees the end of stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::feed::FeedItem;

/// What happened to a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum FeedEvent {
    Add { item: FeedItem },
    Remove { item: FeedItem },
    Empty,
}

/// Events buffered per viewer before it is considered stalled and dropped.
pub const VIEWER_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

struct Connection {
    id: ConnectionId,
    tx: mpsc::Sender<FeedEvent>,
}

#[derive(Default)]
struct FeedSockets {
    connections: Mutex<Vec<Connection>>,
}

#[derive(Clone, Default)]
pub struct NotificationHub {
    feeds: Arc<RwLock<HashMap<String, Arc<FeedSockets>>>>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHub")
            .field("feeds", &self.feeds.read().len())
            .finish()
    }
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn sockets(&self, feed: &str) -> Arc<FeedSockets> {
        if let Some(sockets) = self.feeds.read().get(feed) {
            return sockets.clone();
        }
        self.feeds
            .write()
            .entry(feed.to_string())
            .or_default()
            .clone()
    }

    /// Attach a sender to `feed`. Entries for a feed are created lazily and
    /// kept for the lifetime of the hub.
    pub fn register(&self, feed: &str, tx: mpsc::Sender<FeedEvent>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.sockets(feed).connections.lock().push(Connection { id, tx });
        tracing::debug!(feed, connection = id.0, "viewer registered");
        id
    }

    /// Detach a connection. Unknown ids are ignored.
    pub fn unregister(&self, feed: &str, id: ConnectionId) {
        let Some(sockets) = self.feeds.read().get(feed).cloned() else {
            return;
        };
        let mut connections = sockets.connections.lock();
        let before = connections.len();
        connections.retain(|c| c.id != id);
        if connections.len() != before {
            tracing::debug!(feed, connection = id.0, "viewer unregistered");
        }
    }

    /// Register a fresh channel and wrap it in a guard that unregisters on drop.
    pub fn listen(&self, feed: &str) -> Listener {
        let (tx, rx) = mpsc::channel(VIEWER_QUEUE_DEPTH);
        let id = self.register(feed, tx);
        Listener {
            hub: self.clone(),
            feed: feed.to_string(),
            id,
            rx,
        }
    }

    /// Deliver `event` to every connection on `feed`, in registration order.
    /// Returns how many connections accepted it. Never waits on a viewer.
    pub fn broadcast(&self, feed: &str, event: &FeedEvent) -> usize {
        let Some(sockets) = self.feeds.read().get(feed).cloned() else {
            return 0;
        };

        let mut connections = sockets.connections.lock();
        let before = connections.len();
        connections.retain(|c| match c.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(feed, connection = c.id.0, "viewer queue full, dropping");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        let dropped = before - connections.len();
        if dropped > 0 {
            tracing::debug!(feed, dropped, "removed viewers");
        }
        connections.len()
    }

    pub fn connection_count(&self, feed: &str) -> usize {
        self.feeds
            .read()
            .get(feed)
            .map(|s| s.connections.lock().len())
            .unwrap_or(0)
    }
}

/// Receiving half of a hub registration.
pub struct Listener {
    hub: NotificationHub,
    feed: String,
    id: ConnectionId,
    rx: mpsc::Receiver<FeedEvent>,
}

impl Listener {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn feed(&self) -> &str {
        &self.feed
    }

    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<FeedEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.hub.unregister(&self.feed, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{FeedItemKind, FeedRef};

    fn item(name: &str) -> FeedItem {
        FeedItem {
            name: name.to_string(),
            date: chrono::Utc::now(),
            kind: FeedItemKind::Text,
            feed: FeedRef {
                name: "demo".to_string(),
            },
        }
    }

    #[test]
    fn test_event_wire_shape() {
        let json = serde_json::to_value(FeedEvent::Empty).unwrap();
        assert_eq!(json, serde_json::json!({ "action": "empty" }));

        let json = serde_json::to_value(FeedEvent::Add { item: item("a.txt") }).unwrap();
        assert_eq!(json["action"], "add");
        assert_eq!(json["item"]["name"], "a.txt");
        assert_eq!(json["item"]["type"], 0);
        assert_eq!(json["item"]["feed"]["name"], "demo");
    }

    #[test]
    fn test_broadcast_reaches_only_the_named_feed() {
        let hub = NotificationHub::new();
        let mut a = hub.listen("a");
        let mut b = hub.listen("b");

        assert_eq!(hub.broadcast("a", &FeedEvent::Empty), 1);
        assert_eq!(a.try_recv(), Some(FeedEvent::Empty));
        assert_eq!(b.try_recv(), None);
    }

    #[test]
    fn test_events_arrive_in_order() {
        let hub = NotificationHub::new();
        let mut l = hub.listen("a");

        hub.broadcast("a", &FeedEvent::Add { item: item("1.txt") });
        hub.broadcast("a", &FeedEvent::Remove { item: item("1.txt") });
        hub.broadcast("a", &FeedEvent::Empty);

        assert!(matches!(l.try_recv(), Some(FeedEvent::Add { .. })));
        assert!(matches!(l.try_recv(), Some(FeedEvent::Remove { .. })));
        assert_eq!(l.try_recv(), Some(FeedEvent::Empty));
    }

    #[test]
    fn test_listener_drop_unregisters() {
        let hub = NotificationHub::new();
        let l1 = hub.listen("a");
        let _l2 = hub.listen("a");
        assert_eq!(hub.connection_count("a"), 2);

        drop(l1);
        assert_eq!(hub.connection_count("a"), 1);
        assert_eq!(hub.broadcast("a", &FeedEvent::Empty), 1);
    }

    #[test]
    fn test_closed_sender_removed_on_broadcast() {
        let hub = NotificationHub::new();
        let (tx, rx) = mpsc::channel(1);
        hub.register("a", tx);
        drop(rx);

        assert_eq!(hub.connection_count("a"), 1);
        assert_eq!(hub.broadcast("a", &FeedEvent::Empty), 0);
        assert_eq!(hub.connection_count("a"), 0);
    }

    #[test]
    fn test_stalled_viewer_is_dropped_without_blocking() {
        let hub = NotificationHub::new();
        let mut stalled = hub.listen("a");
        let mut live = hub.listen("a");

        for _ in 0..VIEWER_QUEUE_DEPTH {
            assert_eq!(hub.broadcast("a", &FeedEvent::Empty), 2);
            assert_eq!(live.try_recv(), Some(FeedEvent::Empty));
        }
        // the stalled queue is full now
        assert_eq!(hub.broadcast("a", &FeedEvent::Empty), 1);
        assert_eq!(hub.connection_count("a"), 1);
        assert_eq!(live.try_recv(), Some(FeedEvent::Empty));

        let mut drained = 0;
        while stalled.try_recv().is_some() {
            drained += 1;
        }
        assert_eq!(drained, VIEWER_QUEUE_DEPTH);
    }

    #[tokio::test]
    async fn test_dropped_viewer_sees_end_of_stream() {
        let hub = NotificationHub::new();
        let (tx, mut rx) = mpsc::channel(1);
        hub.register("a", tx);

        assert_eq!(hub.broadcast("a", &FeedEvent::Empty), 1);
        assert_eq!(hub.broadcast("a", &FeedEvent::Empty), 0);
        assert_eq!(rx.recv().await, Some(FeedEvent::Empty));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_broadcast_to_unknown_feed() {
        let hub = NotificationHub::new();
        assert_eq!(hub.broadcast("nobody", &FeedEvent::Empty), 0);
        hub.unregister("nobody", ConnectionId(42));
    }
}
