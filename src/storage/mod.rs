//! Storage contract for the tuple/column store collaborator.
//!
//! The engine itself lives outside this service; core logic talks to it
//! through [`ChatStore`], which captures the semantics the coordination
//! protocols depend on: conditional writes (insert-if-absent,
//! mark-if-unused), per-write consistency selection, and range scans ordered
//! by the time-derived message id. [`memory::MemoryStore`] implements the
//! contract in-process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::message::MessageRecord;
use crate::models::prekey::{OneTimePrekey, StoredPrekeyBundle};
use crate::models::room::{Room, UserRoomView};

pub mod memory;
pub mod timeid;

/// Consistency strength for a single write.
///
/// The message insert runs at `Quorum`; view freshness updates run at `One`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    One,
    Quorum,
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Conditional insert: writes the room only if no row exists for
    /// (team_id, room_id). A lost race returns `AppError::Conflict`.
    async fn insert_room_if_absent(&self, room: &Room) -> AppResult<()>;

    async fn get_room(&self, team_id: &str, room_id: &str) -> AppResult<Option<Room>>;

    async fn upsert_view(&self, view: &UserRoomView) -> AppResult<()>;

    async fn get_view(&self, user_id: &str, room_id: &str) -> AppResult<Option<UserRoomView>>;

    /// All of a user's view rows within a team.
    async fn list_views(&self, team_id: &str, user_id: &str) -> AppResult<Vec<UserRoomView>>;

    /// Refresh the last-message summary on one participant's view row.
    /// Missing rows are ignored (the view is a freshness cache).
    async fn update_view_last_message(
        &self,
        user_id: &str,
        room_id: &str,
        last_message: Option<&str>,
        last_message_type: &str,
        at: DateTime<Utc>,
        consistency: Consistency,
    ) -> AppResult<()>;

    /// Advance the owner's read cursor. Touches only that user's row.
    async fn update_view_last_read(
        &self,
        user_id: &str,
        room_id: &str,
        at: DateTime<Utc>,
    ) -> AppResult<()>;

    async fn insert_message(
        &self,
        message: &MessageRecord,
        consistency: Consistency,
    ) -> AppResult<()>;

    /// Number of messages in the room with id strictly greater than `floor`.
    async fn count_messages_after(&self, room_id: &str, floor: Uuid) -> AppResult<u64>;

    /// Messages in id (creation) order, optionally bounded to ids strictly
    /// below `before`.
    async fn list_messages(
        &self,
        room_id: &str,
        before: Option<Uuid>,
    ) -> AppResult<Vec<MessageRecord>>;

    async fn upsert_prekey_bundle(
        &self,
        user_id: &str,
        device_id: Uuid,
        bundle: &StoredPrekeyBundle,
    ) -> AppResult<()>;

    async fn get_prekey_bundle(
        &self,
        user_id: &str,
        device_id: Uuid,
    ) -> AppResult<Option<StoredPrekeyBundle>>;

    /// Bulk-insert a batch of one-time prekeys. Ids already present keep
    /// their stored state, so a re-upload can never resurrect a used key.
    async fn insert_one_time_prekeys(
        &self,
        user_id: &str,
        device_id: Uuid,
        keys: &[OneTimePrekey],
    ) -> AppResult<()>;

    async fn list_unused_prekeys(
        &self,
        user_id: &str,
        device_id: Uuid,
    ) -> AppResult<Vec<OneTimePrekey>>;

    /// Conditional update: marks the key used only if it is currently
    /// unused. A lost race (or missing key) returns `AppError::Conflict`,
    /// guaranteeing at-most-once delivery per key.
    async fn mark_prekey_used(
        &self,
        user_id: &str,
        device_id: Uuid,
        prekey_id: i32,
    ) -> AppResult<()>;
}
