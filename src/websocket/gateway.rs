//! Per-event gateway logic, kept out of the actor so the connection state
//! machine's actions are plain async functions over [`AppState`].

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::message_types::WsOutboundEvent;
use super::SessionEntry;
use crate::auth::access_token_from_cookies;
use crate::error::{AppError, AppResult};
use crate::models::message::{MessageRecord, NewMessage};
use crate::models::room::StartChat;
use crate::services::message_service::MessageService;
use crate::services::read_cursor_service::ReadCursorService;
use crate::services::room_service::RoomService;
use crate::state::AppState;

/// Resolve a connection's identity from its cookie header: the verification
/// collaborator first, then the token codec. Any failure means the
/// connection never leaves `Connecting`.
pub async fn authenticate(
    state: &AppState,
    connection_id: Uuid,
    cookie_header: &str,
) -> AppResult<SessionEntry> {
    state.verifier.verify(cookie_header).await?;

    let token = access_token_from_cookies(cookie_header).ok_or(AppError::Unauthorized)?;
    let claims = state
        .tokens
        .decode_access_token(&token)
        .ok_or(AppError::Unauthorized)?;

    let entry = SessionEntry {
        user_id: claims.user_id,
        cookie_header: cookie_header.to_string(),
    };
    state.sessions.insert(connection_id, entry.clone()).await;

    tracing::info!(connection_id = %connection_id, user_id = %entry.user_id, "connection authenticated");
    Ok(entry)
}

/// `start_chat`: establish (or find) the room, assemble the caller's view
/// of it, and advance the caller's read cursor as a side effect of opening
/// the room. The caller still needs to subscribe the connection to the
/// returned room id.
pub async fn handle_start_chat(
    state: &AppState,
    session: &SessionEntry,
    payload: &StartChat,
) -> AppResult<(String, WsOutboundEvent)> {
    payload.validate()?;

    let room_id = RoomService::ensure_room(
        state.store.as_ref(),
        state.membership.as_ref(),
        &payload.team_id,
        &session.user_id,
        &payload.receiver_id,
        &session.cookie_header,
    )
    .await?;

    let rooms = RoomService::list_rooms(
        state.store.as_ref(),
        state.membership.as_ref(),
        &payload.team_id,
        &session.user_id,
        &session.cookie_header,
        Some(&room_id),
    )
    .await?;
    let details = rooms.into_iter().next().ok_or(AppError::NotFound)?;

    if let Err(e) = ReadCursorService::mark_read(
        state.store.as_ref(),
        &payload.team_id,
        &room_id,
        &session.user_id,
        Utc::now(),
    )
    .await
    {
        tracing::error!(%room_id, error = %e, "read cursor update on room open failed");
    }

    let reply = WsOutboundEvent::ChatRoom {
        status: "success".to_string(),
        data: details,
    };
    Ok((room_id, reply))
}

/// `send_message`: run the store coordinator, then hand the event to the
/// fanout fabric. Delivery to the sender happens through the fabric like
/// everyone else's; there is no separate acknowledgment.
pub async fn handle_send_message(
    state: &AppState,
    session: &SessionEntry,
    payload: &NewMessage,
) -> AppResult<MessageRecord> {
    let record =
        MessageService::send_message(state.store.as_ref(), &session.user_id, payload).await?;

    let event = WsOutboundEvent::NewMessage {
        message: record.clone(),
    };
    state
        .fanout
        .publish(&record.room_id, serde_json::to_string(&event)?)
        .await?;

    Ok(record)
}

/// Translate a component error into the event sent to the originating
/// connection. Full detail is logged here; callers only see the public
/// message and code.
pub fn error_event(err: &AppError) -> WsOutboundEvent {
    if err.status_code() >= 500 {
        tracing::error!(error = %err, "gateway operation failed");
    }
    WsOutboundEvent::Error {
        code: err.event_code().to_string(),
        message: err.public_message(),
    }
}
