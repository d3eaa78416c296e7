//! Pub/sub fanout fabric.
//!
//! The gateway publishes room events through [`FanoutTransport`] and never
//! writes to local sockets directly: delivery always loops back through the
//! fabric, so a message reaches every subscribed connection on every
//! instance (the sender's included) the same way.

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use super::ConnectionRegistry;
use crate::error::{AppError, AppResult};

const FANOUT_CHANNEL: &str = "chat:fanout";

#[async_trait]
pub trait FanoutTransport: Send + Sync {
    /// Deliver a serialized event to every subscriber of the room, across
    /// all instances.
    async fn publish(&self, room_id: &str, payload: String) -> AppResult<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct FanoutEnvelope {
    room_id: String,
    payload: String,
}

/// In-process fanout for tests and single-instance deployments.
pub struct LocalFanout {
    registry: ConnectionRegistry,
}

impl LocalFanout {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl FanoutTransport for LocalFanout {
    async fn publish(&self, room_id: &str, payload: String) -> AppResult<()> {
        self.registry.broadcast(room_id, payload).await;
        Ok(())
    }
}

/// Redis pub/sub fanout: one shared channel, every instance subscribes and
/// routes received envelopes into its local registry.
pub struct RedisFanout {
    manager: ConnectionManager,
}

impl RedisFanout {
    pub async fn connect(url: &str, registry: ConnectionRegistry) -> AppResult<Self> {
        let client = redis::Client::open(url).map_err(AppError::from)?;
        let manager = ConnectionManager::new(client.clone()).await?;

        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(FANOUT_CHANNEL).await?;

        tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(error = %e, "fanout payload not readable");
                        continue;
                    }
                };
                match serde_json::from_str::<FanoutEnvelope>(&payload) {
                    Ok(envelope) => {
                        registry.broadcast(&envelope.room_id, envelope.payload).await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "fanout envelope not parseable");
                    }
                }
            }
            tracing::warn!("fanout subscriber stream ended");
        });

        Ok(Self { manager })
    }
}

#[async_trait]
impl FanoutTransport for RedisFanout {
    async fn publish(&self, room_id: &str, payload: String) -> AppResult<()> {
        let envelope = serde_json::to_string(&FanoutEnvelope {
            room_id: room_id.to_string(),
            payload,
        })?;
        let mut conn = self.manager.clone();
        conn.publish::<_, _, ()>(FANOUT_CHANNEL, envelope).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_fanout_loops_back_through_the_registry() {
        let registry = ConnectionRegistry::new();
        let fanout = LocalFanout::new(registry.clone());

        let (_id, mut rx) = registry.add_subscriber("room_x").await;
        fanout.publish("room_x", "payload".to_string()).await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("payload"));
    }

    #[test]
    fn envelope_round_trips() {
        let envelope = FanoutEnvelope {
            room_id: "room_teamAAAAA_1001_1002".into(),
            payload: r#"{"type":"new_message"}"#.into(),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        let back: FanoutEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.room_id, envelope.room_id);
        assert_eq!(back.payload, envelope.payload);
    }
}
