use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{validate_team_id, validate_user_id};

/// Durable pairing of two users within a team. `user_a` <= `user_b`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub team_id: String,
    pub room_id: String,
    pub user_a: String,
    pub user_b: String,
    pub created_at: DateTime<Utc>,
}

/// Per-user denormalized summary row for a room. Two independent rows exist
/// per room, one per participant; message sends refresh both, the read
/// cursor is owner-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRoomView {
    pub team_id: String,
    pub user_id: String,
    pub room_id: String,
    pub participant_id: String,
    pub last_message: Option<String>,
    pub last_message_type: Option<String>,
    pub last_message_timestamp: Option<DateTime<Utc>>,
    pub last_read: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Room listing entry: the view row joined with the participant's profile
/// and the unread count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDetails {
    pub room_id: String,
    pub participant_id: String,
    pub participant_name: String,
    pub is_participant_online: bool,
    pub participant_profile_pic: String,
    pub last_message: Option<String>,
    pub last_message_type: Option<String>,
    pub unread_messages_count: u64,
    pub created_at: DateTime<Utc>,
}

/// `start_chat` payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StartChat {
    #[validate(custom(function = "validate_team_id"))]
    pub team_id: String,
    #[validate(custom(function = "validate_user_id"))]
    pub receiver_id: String,
}
