//! Room listing and room history endpoints.

use actix_web::{get, web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use super::cookie_header;
use crate::error::AppError;
use crate::models::{validate_room_id, validate_team_id, validate_user_id};
use crate::services::message_service::MessageService;
use crate::services::room_service::RoomService;
use crate::state::AppState;

fn default_rooms_limit() -> usize {
    10
}

fn default_messages_limit() -> usize {
    50
}

#[derive(Debug, Deserialize, Validate)]
pub struct RoomsQuery {
    #[validate(custom(function = "validate_team_id"))]
    pub team_id: String,
    #[validate(custom(function = "validate_user_id"))]
    pub user_id: String,
    #[validate(length(max = 50))]
    pub search: Option<String>,
    #[serde(default = "default_rooms_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: usize,
    #[serde(default)]
    pub skip: usize,
}

#[get("/api/chats/rooms")]
pub async fn get_user_chat_rooms(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<RoomsQuery>,
) -> Result<HttpResponse, AppError> {
    let cookies = cookie_header(&req);
    state.verifier.verify(&cookies).await?;

    let query = query.into_inner();
    query.validate()?;

    let mut rooms = RoomService::list_rooms(
        state.store.as_ref(),
        state.membership.as_ref(),
        &query.team_id,
        &query.user_id,
        &cookies,
        None,
    )
    .await?;

    if let Some(needle) = query.search.as_deref().map(str::to_lowercase) {
        rooms.retain(|room| {
            room.participant_name.to_lowercase().contains(&needle)
                || room
                    .last_message
                    .as_deref()
                    .is_some_and(|m| m.to_lowercase().contains(&needle))
        });
    }

    let page: Vec<_> = rooms.into_iter().skip(query.skip).take(query.limit).collect();
    Ok(HttpResponse::Ok().json(page))
}

#[derive(Debug, Deserialize, Validate)]
pub struct MessagesQuery {
    #[validate(custom(function = "validate_team_id"))]
    pub team_id: String,
    #[validate(custom(function = "validate_user_id"))]
    pub user_id: String,
    #[validate(length(max = 50))]
    pub search: Option<String>,
    /// Upper bound: only messages created before this instant.
    pub before: Option<DateTime<Utc>>,
    #[serde(default = "default_messages_limit")]
    #[validate(range(min = 1, max = 200))]
    pub limit: usize,
    #[serde(default)]
    pub skip: usize,
}

#[get("/api/chats/rooms/{room_id}/messages")]
pub async fn get_room_messages(
    req: HttpRequest,
    state: web::Data<AppState>,
    room_id: web::Path<String>,
    query: web::Query<MessagesQuery>,
) -> Result<HttpResponse, AppError> {
    let cookies = cookie_header(&req);
    state.verifier.verify(&cookies).await?;

    let room_id = room_id.into_inner();
    validate_room_id(&room_id).map_err(|_| AppError::BadRequest("invalid room id".into()))?;
    let query = query.into_inner();
    query.validate()?;

    let page = MessageService::list_messages(
        state.store.as_ref(),
        &query.team_id,
        &room_id,
        &query.user_id,
        query.search.as_deref(),
        query.before,
        query.limit,
        query.skip,
    )
    .await?;

    let count = page.messages.len();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "room_id": room_id,
        "messages": page.messages,
        "count": count,
        "total": page.total,
        "has_more": page.has_more,
    })))
}
