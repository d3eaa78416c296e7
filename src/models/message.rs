use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{validate_file_name, validate_mime_type, validate_room_id, validate_user_id};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
    File,
    Audio,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Video => "video",
            MessageType::File => "file",
            MessageType::Audio => "audio",
        }
    }
}

/// Immutable message row. `message_id` is the room's canonical ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub room_id: String,
    pub message_id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// `send_message` payload, validated before the coordinator runs.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMessage {
    #[validate(custom(function = "validate_room_id"))]
    pub room_id: String,
    #[validate(custom(function = "validate_user_id"))]
    pub receiver_id: String,
    pub message_type: MessageType,
    #[validate(length(max = 1000))]
    pub content: Option<String>,
    #[validate(length(max = 200))]
    pub attachment_url: Option<String>,
    #[validate(length(max = 100), custom(function = "validate_file_name"))]
    pub file_name: Option<String>,
    #[validate(range(min = 1, max = 10_000_000))]
    pub file_size: Option<u64>,
    #[validate(length(max = 50), custom(function = "validate_mime_type"))]
    pub mime_type: Option<String>,
}

impl NewMessage {
    /// Field-level constraints plus the cross-field rule: text messages need
    /// content, everything else needs the full attachment quartet.
    pub fn validate_payload(&self) -> AppResult<()> {
        self.validate()?;

        if self.message_type == MessageType::Text {
            let has_content = self
                .content
                .as_deref()
                .map(str::trim)
                .is_some_and(|c| !c.is_empty());
            if !has_content {
                return Err(AppError::BadRequest(
                    "content is required for text messages".into(),
                ));
            }
        } else {
            let mut missing = Vec::new();
            if self.attachment_url.as_deref().map_or(true, |v| v.trim().is_empty()) {
                missing.push("attachment_url");
            }
            if self.file_name.as_deref().map_or(true, |v| v.trim().is_empty()) {
                missing.push("file_name");
            }
            if self.file_size.is_none() {
                missing.push("file_size");
            }
            if self.mime_type.as_deref().map_or(true, |v| v.trim().is_empty()) {
                missing.push("mime_type");
            }
            if !missing.is_empty() {
                return Err(AppError::BadRequest(format!(
                    "missing fields for non-text messages: {}",
                    missing.join(", ")
                )));
            }
        }

        Ok(())
    }
}
