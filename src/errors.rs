use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{fmt, io};
use thiserror::Error;

/// Why a key or volume name was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    TooShort { field: &'static str },
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("{field} contains invalid characters")]
    InvalidCharacters { field: &'static str },
    #[error("{field} must not be negative")]
    Negative { field: &'static str },
}

/// Errors produced by entities, repositories and the services composed on top of them.
///
/// `NotFound` is the sentinel repositories return for a missing row; services
/// translate it where a missing row is the expected outcome and pass every
/// other variant through untouched.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entry is required")]
    RequiredEntry,
    #[error("volume is required")]
    RequiredVolume,
    #[error("account id is required")]
    RequiredAccountId,
    #[error("volume id is required")]
    RequiredVolumeId,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("entry `{0}` already exists")]
    EntryAlreadyExists(String),
    #[error("volume `{0}` already exists")]
    VolumeAlreadyExists(String),
    #[error("volume `{0}` still has entries")]
    VolumeHasEntries(String),
    #[error("no free copy name for `{key}` after {attempts} attempts")]
    CopyLimitExceeded { key: String, attempts: usize },
    #[error("cannot move `{from}` into `{to}`")]
    InvalidMove { from: String, to: String },
    #[error("record not found")]
    NotFound,
    #[error("volume `{0}` not found")]
    VolumeNotFound(String),
    #[error("entry `{key}` not found in volume `{volume}`")]
    EntryNotFound { volume: String, key: String },
    #[error("invalid body path `{0}`")]
    InvalidBodyPath(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for 401 Unauthorized
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::RequiredEntry
            | StoreError::RequiredVolume
            | StoreError::RequiredAccountId
            | StoreError::RequiredVolumeId
            | StoreError::Validation(_)
            | StoreError::InvalidMove { .. }
            | StoreError::InvalidBodyPath(_) => StatusCode::BAD_REQUEST,
            StoreError::EntryAlreadyExists(_)
            | StoreError::VolumeAlreadyExists(_)
            | StoreError::VolumeHasEntries(_)
            | StoreError::CopyLimitExceeded { .. } => StatusCode::CONFLICT,
            StoreError::NotFound
            | StoreError::VolumeNotFound(_)
            | StoreError::EntryNotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::Sqlx(_) | StoreError::Io(_) => {
                tracing::error!("upstream failure: {}", err);
                return AppError::internal("internal storage error");
            }
        };
        AppError::new(status, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_map_to_409() {
        let err: AppError = StoreError::VolumeAlreadyExists("docs".into()).into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, "volume `docs` already exists");
    }

    #[test]
    fn upstream_errors_hide_details() {
        let err: AppError = StoreError::Sqlx(sqlx::Error::PoolTimedOut).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "internal storage error");
    }

    #[test]
    fn validation_maps_to_400() {
        let err: AppError = StoreError::from(ValidationError::TooShort { field: "key" }).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "key must not be empty");
    }
}
