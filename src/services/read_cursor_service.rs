//! Per-user read cursor and unread counting.

use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::storage::{timeid, ChatStore};

pub struct ReadCursorService;

impl ReadCursorService {
    /// Messages in the room after the user's read cursor.
    ///
    /// An absent cursor (or absent view row) means nothing has been read
    /// yet. The cursor timestamp is converted to the smallest time-ordered
    /// id at that instant, so the count is a strict-greater id range scan.
    /// The value is advisory: a message landing between this read and its
    /// use is picked up by the next call.
    pub async fn unread_count(
        store: &dyn ChatStore,
        team_id: &str,
        room_id: &str,
        user_id: &str,
    ) -> AppResult<u64> {
        let last_read = store
            .get_view(user_id, room_id)
            .await?
            .filter(|v| v.team_id == team_id)
            .and_then(|v| v.last_read)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        store
            .count_messages_after(room_id, timeid::floor(last_read))
            .await
    }

    /// Advance the caller's own read cursor. Never touches the
    /// counterpart's row or count.
    pub async fn mark_read(
        store: &dyn ChatStore,
        _team_id: &str,
        room_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        store.update_view_last_read(user_id, room_id, at).await
    }
}
