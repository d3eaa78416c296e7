use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error, Clone)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("no available one-time prekeys")]
    Exhausted,

    /// Conditional write was not applied (insert-if-absent or
    /// mark-if-unused lost the race). Absorbed by callers, never
    /// surfaced to clients.
    #[error("conditional write not applied")]
    Conflict,

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("internal server error")]
    Internal,
}

impl AppError {
    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Unauthorized => 401,
            AppError::NotFound => 404,
            AppError::Exhausted => 410, // 410 Gone
            AppError::Conflict => 409,
            _ => 500,
        }
    }

    /// Machine-readable code used by the gateway `error` event.
    pub fn event_code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "validation_error",
            AppError::Unauthorized => "unauthorized",
            AppError::NotFound => "not_found",
            AppError::Exhausted => "exhausted",
            _ => "internal_error",
        }
    }

    /// Message safe to hand to a caller. Upstream/internal detail is
    /// logged server-side only.
    pub fn public_message(&self) -> String {
        match self {
            AppError::BadRequest(_)
            | AppError::Unauthorized
            | AppError::NotFound
            | AppError::Exhausted => self.to_string(),
            _ => "internal server error".to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        HttpResponse::build(status).json(serde_json::json!({
            "detail": self.public_message(),
        }))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Upstream(e.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::Upstream(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Upstream(format!("serialize: {e}"))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(AppError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(AppError::Unauthorized.status_code(), 401);
        assert_eq!(AppError::NotFound.status_code(), 404);
        assert_eq!(AppError::Exhausted.status_code(), 410);
        assert_eq!(AppError::Upstream("db down".into()).status_code(), 500);
    }

    #[test]
    fn upstream_detail_is_not_leaked() {
        let err = AppError::Upstream("connection refused to 10.0.0.3".into());
        assert_eq!(err.public_message(), "internal server error");
        assert_eq!(err.event_code(), "internal_error");
    }

    #[test]
    fn caller_visible_errors_keep_their_message() {
        let err = AppError::BadRequest("content is required".into());
        assert!(err.public_message().contains("content is required"));
        assert_eq!(err.event_code(), "validation_error");
    }
}
