pub mod membership;
pub mod message_service;
pub mod prekey_service;
pub mod read_cursor_service;
pub mod room_service;
