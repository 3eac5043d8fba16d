use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;
use uuid::Uuid;

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

    #[error("conflicting concurrent update, retry")]
    Conflict,

    #[error("user {user_id} is not a participant of conversation {conversation_id}")]
    InvalidParticipant {
        user_id: Uuid,
        conversation_id: Uuid,
    },

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<tokio_postgres::Error> for AppError {
    fn from(e: tokio_postgres::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for AppError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        AppError::Database(e.to_string())
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        HttpResponse::build(status).json(serde_json::json!({ "error": self.to_string() }))
    }
}

impl AppError {
    /// Returns whether this error is safe to retry (the underlying atomic
    /// update lost a race, or the store hiccuped transiently). `Unavailable`
    /// is excluded: it is what a retry loop emits once attempts are spent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Conflict | AppError::Database(_))
    }

    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Unauthorized => 401,
            AppError::InvalidParticipant { .. } => 403,
            AppError::NotFound => 404,
            AppError::Conflict => 409,
            AppError::Unavailable(_) => 503,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_covers_races_and_transient_db_failures_only() {
        assert!(AppError::Conflict.is_retryable());
        assert!(AppError::Database("connection reset".into()).is_retryable());
        assert!(!AppError::Unavailable("spent".into()).is_retryable());
        assert!(!AppError::NotFound.is_retryable());
        assert!(!AppError::InvalidParticipant {
            user_id: Uuid::nil(),
            conversation_id: Uuid::nil(),
        }
        .is_retryable());
    }

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(AppError::Conflict.status_code(), 409);
        assert_eq!(AppError::Unavailable("spent".into()).status_code(), 503);
        assert_eq!(
            AppError::InvalidParticipant {
                user_id: Uuid::nil(),
                conversation_id: Uuid::nil(),
            }
            .status_code(),
            403
        );
        assert_eq!(AppError::Database("boom".into()).status_code(), 500);
    }
}
