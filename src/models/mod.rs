//! Typed records for the storage and wire boundaries.
//!
//! Rows coming back from the store and payloads coming off the wire are
//! materialized into these types before any core logic sees them.

use validator::ValidationError;

pub mod member;
pub mod message;
pub mod prekey;
pub mod room;

pub(crate) fn validate_team_id(value: &str) -> Result<(), ValidationError> {
    if value.len() < 9 || value.len() > 10 || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::new("team_id"));
    }
    Ok(())
}

pub(crate) fn validate_user_id(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.len() > 10 || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new("user_id"));
    }
    Ok(())
}

pub(crate) fn validate_room_id(value: &str) -> Result<(), ValidationError> {
    if value.is_empty()
        || value.len() > 64
        || !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ValidationError::new("room_id"));
    }
    Ok(())
}

pub(crate) fn validate_file_name(value: &str) -> Result<(), ValidationError> {
    let ok = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '));
    if value.is_empty() || !ok {
        return Err(ValidationError::new("file_name"));
    }
    Ok(())
}

pub(crate) fn validate_mime_type(value: &str) -> Result<(), ValidationError> {
    let mut parts = value.splitn(2, '/');
    let (Some(kind), Some(subtype)) = (parts.next(), parts.next()) else {
        return Err(ValidationError::new("mime_type"));
    };
    let kind_ok = !kind.is_empty() && kind.chars().all(|c| c.is_ascii_lowercase());
    let subtype_ok = !subtype.is_empty()
        && subtype
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '+'));
    if !kind_ok || !subtype_ok {
        return Err(ValidationError::new("mime_type"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_ids_are_nine_or_ten_alphanumerics() {
        assert!(validate_team_id("teamAAAAA").is_ok());
        assert!(validate_team_id("teamAAAAA1").is_ok());
        assert!(validate_team_id("short").is_err());
        assert!(validate_team_id("has space!").is_err());
    }

    #[test]
    fn user_ids_are_digits() {
        assert!(validate_user_id("1001").is_ok());
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("12345678901").is_err());
        assert!(validate_user_id("12a").is_err());
    }

    #[test]
    fn mime_types_need_type_and_subtype() {
        assert!(validate_mime_type("image/png").is_ok());
        assert!(validate_mime_type("application/vnd.ms+xml").is_ok());
        assert!(validate_mime_type("imagepng").is_err());
        assert!(validate_mime_type("Image/PNG").is_err());
    }
}
