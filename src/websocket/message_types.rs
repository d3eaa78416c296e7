use serde::{Deserialize, Serialize};

use crate::models::message::{MessageRecord, NewMessage};
use crate::models::room::{RoomDetails, StartChat};

/// Inbound WebSocket events from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum WsInboundEvent {
    #[serde(rename = "start_chat")]
    StartChat(StartChat),

    #[serde(rename = "send_message")]
    SendMessage(NewMessage),
}

/// Outbound WebSocket events from server to client
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum WsOutboundEvent {
    /// Authentication failed; the connection is about to close.
    #[serde(rename = "auth_failed")]
    AuthFailed { message: String },

    /// A component error, delivered to the originating connection only.
    #[serde(rename = "error")]
    Error { code: String, message: String },

    /// Reply to `start_chat`: the caller's view of the room.
    #[serde(rename = "chat_room")]
    ChatRoom { status: String, data: RoomDetails },

    /// Broadcast to every connection subscribed to the room.
    #[serde(rename = "new_message")]
    NewMessage {
        #[serde(flatten)]
        message: MessageRecord,
    },
}
