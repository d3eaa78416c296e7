//! Message store coordinator: canonical insert plus denormalized fan-out.

use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};
use crate::models::message::{MessageRecord, NewMessage};
use crate::storage::{timeid, ChatStore, Consistency};

/// One page of a room's timeline.
#[derive(Debug, Clone)]
pub struct MessagePage {
    pub messages: Vec<MessageRecord>,
    pub total: usize,
    pub has_more: bool,
}

pub struct MessageService;

impl MessageService {
    /// Persist a message and refresh both participants' view rows.
    ///
    /// Three independent writes, not a transaction: the message insert runs
    /// at quorum and is the canonical truth; the two view updates run at
    /// consistency one and are a freshness cache, so their failures are
    /// logged and tolerated.
    pub async fn send_message(
        store: &dyn ChatStore,
        sender_id: &str,
        payload: &NewMessage,
    ) -> AppResult<MessageRecord> {
        payload.validate_payload()?;

        store
            .get_view(sender_id, &payload.room_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let record = MessageRecord {
            room_id: payload.room_id.clone(),
            message_id: timeid::allocate(),
            sender_id: sender_id.to_string(),
            receiver_id: payload.receiver_id.clone(),
            message_type: payload.message_type,
            content: payload.content.clone(),
            attachment_url: payload.attachment_url.clone(),
            file_name: payload.file_name.clone(),
            file_size: payload.file_size,
            mime_type: payload.mime_type.clone(),
            timestamp: Utc::now(),
        };

        let (canonical, sender_view, receiver_view) = futures::join!(
            store.insert_message(&record, Consistency::Quorum),
            store.update_view_last_message(
                sender_id,
                &record.room_id,
                record.content.as_deref(),
                record.message_type.as_str(),
                record.timestamp,
                Consistency::One,
            ),
            store.update_view_last_message(
                &record.receiver_id,
                &record.room_id,
                record.content.as_deref(),
                record.message_type.as_str(),
                record.timestamp,
                Consistency::One,
            ),
        );

        canonical?;
        for (who, result) in [("sender", sender_view), ("receiver", receiver_view)] {
            if let Err(e) = result {
                tracing::error!(
                    room_id = %record.room_id,
                    view = who,
                    error = %e,
                    "view refresh failed"
                );
            }
        }

        Ok(record)
    }

    /// A room's timeline in id order, with optional substring search, an
    /// optional upper timestamp bound, and skip/limit pagination.
    #[allow(clippy::too_many_arguments)]
    pub async fn list_messages(
        store: &dyn ChatStore,
        team_id: &str,
        room_id: &str,
        user_id: &str,
        search: Option<&str>,
        before: Option<DateTime<Utc>>,
        limit: usize,
        skip: usize,
    ) -> AppResult<MessagePage> {
        let view = store
            .get_view(user_id, room_id)
            .await?
            .filter(|v| v.team_id == team_id);
        if view.is_none() {
            return Err(AppError::NotFound);
        }

        let bound = before.map(timeid::floor);
        let mut messages = store.list_messages(room_id, bound).await?;

        if let Some(needle) = search.map(str::to_lowercase).filter(|s| !s.is_empty()) {
            messages.retain(|m| {
                m.content
                    .as_deref()
                    .is_some_and(|c| c.to_lowercase().contains(&needle))
            });
        }

        let total = messages.len();
        let page: Vec<MessageRecord> = messages.into_iter().skip(skip).take(limit).collect();
        let has_more = total > skip + limit;

        Ok(MessagePage {
            messages: page,
            total,
            has_more,
        })
    }
}
