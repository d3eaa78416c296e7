//! In-memory implementation of the store contract.
//!
//! Backs tests and single-instance deployments. Conditional writes hold the
//! table's write lock for the whole check-then-write, which gives them the
//! same atomicity the engine's IF-clauses provide.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ChatStore, Consistency};
use crate::error::{AppError, AppResult};
use crate::models::message::MessageRecord;
use crate::models::prekey::{OneTimePrekey, StoredPrekeyBundle};
use crate::models::room::{Room, UserRoomView};

type RoomKey = (String, String); // (team_id, room_id)
type ViewKey = (String, String); // (user_id, room_id)
type DeviceKey = (String, Uuid); // (user_id, device_id)

#[derive(Default)]
pub struct MemoryStore {
    rooms: Arc<RwLock<HashMap<RoomKey, Room>>>,
    views: Arc<RwLock<HashMap<ViewKey, UserRoomView>>>,
    messages: Arc<RwLock<HashMap<String, BTreeMap<Uuid, MessageRecord>>>>,
    bundles: Arc<RwLock<HashMap<DeviceKey, StoredPrekeyBundle>>>,
    one_time_keys: Arc<RwLock<HashMap<DeviceKey, BTreeMap<i32, OneTimePrekey>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn insert_room_if_absent(&self, room: &Room) -> AppResult<()> {
        let mut rooms = self.rooms.write().await;
        let key = (room.team_id.clone(), room.room_id.clone());
        if rooms.contains_key(&key) {
            return Err(AppError::Conflict);
        }
        rooms.insert(key, room.clone());
        Ok(())
    }

    async fn get_room(&self, team_id: &str, room_id: &str) -> AppResult<Option<Room>> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(&(team_id.to_string(), room_id.to_string())).cloned())
    }

    async fn upsert_view(&self, view: &UserRoomView) -> AppResult<()> {
        let mut views = self.views.write().await;
        views.insert((view.user_id.clone(), view.room_id.clone()), view.clone());
        Ok(())
    }

    async fn get_view(&self, user_id: &str, room_id: &str) -> AppResult<Option<UserRoomView>> {
        let views = self.views.read().await;
        Ok(views.get(&(user_id.to_string(), room_id.to_string())).cloned())
    }

    async fn list_views(&self, team_id: &str, user_id: &str) -> AppResult<Vec<UserRoomView>> {
        let views = self.views.read().await;
        let mut rows: Vec<UserRoomView> = views
            .values()
            .filter(|v| v.team_id == team_id && v.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        Ok(rows)
    }

    async fn update_view_last_message(
        &self,
        user_id: &str,
        room_id: &str,
        last_message: Option<&str>,
        last_message_type: &str,
        at: DateTime<Utc>,
        _consistency: Consistency,
    ) -> AppResult<()> {
        let mut views = self.views.write().await;
        if let Some(view) = views.get_mut(&(user_id.to_string(), room_id.to_string())) {
            view.last_message = last_message.map(|s| s.to_string());
            view.last_message_type = Some(last_message_type.to_string());
            view.last_message_timestamp = Some(at);
        }
        Ok(())
    }

    async fn update_view_last_read(
        &self,
        user_id: &str,
        room_id: &str,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut views = self.views.write().await;
        if let Some(view) = views.get_mut(&(user_id.to_string(), room_id.to_string())) {
            view.last_read = Some(at);
        }
        Ok(())
    }

    async fn insert_message(
        &self,
        message: &MessageRecord,
        _consistency: Consistency,
    ) -> AppResult<()> {
        let mut messages = self.messages.write().await;
        messages
            .entry(message.room_id.clone())
            .or_default()
            .insert(message.message_id, message.clone());
        Ok(())
    }

    async fn count_messages_after(&self, room_id: &str, floor: Uuid) -> AppResult<u64> {
        let messages = self.messages.read().await;
        let count = messages
            .get(room_id)
            .map(|timeline| timeline.range((std::ops::Bound::Excluded(floor), std::ops::Bound::Unbounded)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn list_messages(
        &self,
        room_id: &str,
        before: Option<Uuid>,
    ) -> AppResult<Vec<MessageRecord>> {
        let messages = self.messages.read().await;
        let Some(timeline) = messages.get(room_id) else {
            return Ok(Vec::new());
        };
        let rows = match before {
            Some(bound) => timeline.range(..bound).map(|(_, m)| m.clone()).collect(),
            None => timeline.values().cloned().collect(),
        };
        Ok(rows)
    }

    async fn upsert_prekey_bundle(
        &self,
        user_id: &str,
        device_id: Uuid,
        bundle: &StoredPrekeyBundle,
    ) -> AppResult<()> {
        let mut bundles = self.bundles.write().await;
        bundles.insert((user_id.to_string(), device_id), bundle.clone());
        Ok(())
    }

    async fn get_prekey_bundle(
        &self,
        user_id: &str,
        device_id: Uuid,
    ) -> AppResult<Option<StoredPrekeyBundle>> {
        let bundles = self.bundles.read().await;
        Ok(bundles.get(&(user_id.to_string(), device_id)).cloned())
    }

    async fn insert_one_time_prekeys(
        &self,
        user_id: &str,
        device_id: Uuid,
        keys: &[OneTimePrekey],
    ) -> AppResult<()> {
        let mut pools = self.one_time_keys.write().await;
        let pool = pools.entry((user_id.to_string(), device_id)).or_default();
        for key in keys {
            pool.entry(key.prekey_id).or_insert_with(|| key.clone());
        }
        Ok(())
    }

    async fn list_unused_prekeys(
        &self,
        user_id: &str,
        device_id: Uuid,
    ) -> AppResult<Vec<OneTimePrekey>> {
        let pools = self.one_time_keys.read().await;
        let keys = pools
            .get(&(user_id.to_string(), device_id))
            .map(|pool| pool.values().filter(|k| !k.used).cloned().collect())
            .unwrap_or_default();
        Ok(keys)
    }

    async fn mark_prekey_used(
        &self,
        user_id: &str,
        device_id: Uuid,
        prekey_id: i32,
    ) -> AppResult<()> {
        let mut pools = self.one_time_keys.write().await;
        let key = pools
            .get_mut(&(user_id.to_string(), device_id))
            .and_then(|pool| pool.get_mut(&prekey_id))
            .ok_or(AppError::Conflict)?;
        if key.used {
            return Err(AppError::Conflict);
        }
        key.used = true;
        Ok(())
    }
}
