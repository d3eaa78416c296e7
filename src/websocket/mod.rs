use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod fanout;
pub mod gateway;
pub mod message_types;
pub mod session;

/// Unique identifier for a room subscription held by one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

struct Subscriber {
    id: SubscriberId,
    sender: UnboundedSender<String>,
}

/// Tracks which connections are subscribed to which room channels.
///
/// Cleanup is keyed by subscriber id so a closing connection removes exactly
/// its own entries.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<String, Vec<Subscriber>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_subscriber(&self, room_id: &str) -> (SubscriberId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let subscriber_id = SubscriberId::new();

        let mut guard = self.inner.write().await;
        guard.entry(room_id.to_string()).or_default().push(Subscriber {
            id: subscriber_id,
            sender: tx,
        });

        tracing::debug!(
            room_id,
            subscribers = guard.get(room_id).map(|v| v.len()).unwrap_or(0),
            "subscriber added"
        );

        (subscriber_id, rx)
    }

    pub async fn remove_subscriber(&self, room_id: &str, subscriber_id: SubscriberId) {
        let mut guard = self.inner.write().await;
        if let Some(subscribers) = guard.get_mut(room_id) {
            subscribers.retain(|s| s.id != subscriber_id);
            if subscribers.is_empty() {
                guard.remove(room_id);
            }
        }
    }

    /// Deliver a payload to every subscriber of the room, dropping senders
    /// whose connection has gone away.
    pub async fn broadcast(&self, room_id: &str, msg: String) {
        let mut guard = self.inner.write().await;
        if let Some(subscribers) = guard.get_mut(room_id) {
            let before = subscribers.len();
            subscribers.retain(|subscriber| subscriber.sender.send(msg.clone()).is_ok());
            let after = subscribers.len();
            if before != after {
                tracing::debug!(
                    room_id,
                    cleaned = before - after,
                    active = after,
                    "dead subscribers removed during broadcast"
                );
            }
        }
    }

    pub async fn subscriber_count(&self, room_id: &str) -> usize {
        let guard = self.inner.read().await;
        guard.get(room_id).map(|v| v.len()).unwrap_or(0)
    }
}

/// Authenticated session bound to a live connection.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub user_id: String,
    pub cookie_header: String,
}

/// Process-wide connection → session map owned by the gateway.
///
/// Inserted on auth success, removed on disconnect.
#[derive(Default, Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, connection_id: Uuid, entry: SessionEntry) {
        self.inner.write().await.insert(connection_id, entry);
    }

    pub async fn get(&self, connection_id: Uuid) -> Option<SessionEntry> {
        self.inner.read().await.get(&connection_id).cloned()
    }

    pub async fn remove(&self, connection_id: Uuid) {
        self.inner.write().await.remove(&connection_id);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers_and_cleans_dead_ones() {
        let registry = ConnectionRegistry::new();
        let (_id1, mut rx1) = registry.add_subscriber("room_a").await;
        let (_id2, rx2) = registry.add_subscriber("room_a").await;
        drop(rx2);

        registry.broadcast("room_a", "hello".to_string()).await;
        assert_eq!(rx1.recv().await.as_deref(), Some("hello"));
        assert_eq!(registry.subscriber_count("room_a").await, 1);
    }

    #[tokio::test]
    async fn removal_is_scoped_to_the_subscriber() {
        let registry = ConnectionRegistry::new();
        let (id1, _rx1) = registry.add_subscriber("room_a").await;
        let (_id2, mut rx2) = registry.add_subscriber("room_a").await;

        registry.remove_subscriber("room_a", id1).await;
        registry.broadcast("room_a", "still here".to_string()).await;
        assert_eq!(rx2.recv().await.as_deref(), Some("still here"));
        assert_eq!(registry.subscriber_count("room_a").await, 1);
    }

    #[tokio::test]
    async fn session_registry_lifecycle() {
        let sessions = SessionRegistry::new();
        let conn = Uuid::new_v4();
        sessions
            .insert(
                conn,
                SessionEntry {
                    user_id: "1001".into(),
                    cookie_header: "access=tok".into(),
                },
            )
            .await;
        assert_eq!(sessions.get(conn).await.unwrap().user_id, "1001");

        sessions.remove(conn).await;
        assert!(sessions.get(conn).await.is_none());
        assert!(sessions.is_empty().await);
    }
}
