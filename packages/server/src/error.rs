use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::storage::StorageError;
use sea_orm::DbErr;
use serde::Serialize;

use crate::gallery::GalleryError;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `INVALID_FILE_TYPE`,
    /// `DUPLICATE_UPLOAD`, `FILE_TOO_LARGE`, `TOKEN_MISSING`, `TOKEN_INVALID`,
    /// `INVALID_CREDENTIALS`, `NOT_FOUND`, `CONFLICT`, `USERNAME_TAKEN`,
    /// `INTERNAL_ERROR`.
    #[schema(example = "INVALID_FILE_TYPE")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Invalid file type. Only JPEG, PNG, GIF, and WebP are allowed.")]
    pub error: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    InvalidFileType(String),
    DuplicateUpload(String),
    FileTooLarge(String),
    TokenMissing,
    TokenInvalid,
    InvalidCredentials,
    NotFound(String),
    Conflict(String),
    UsernameTaken,
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        let (status, code, error) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            AppError::InvalidFileType(msg) => (StatusCode::BAD_REQUEST, "INVALID_FILE_TYPE", msg),
            AppError::DuplicateUpload(msg) => (StatusCode::BAD_REQUEST, "DUPLICATE_UPLOAD", msg),
            AppError::FileTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE", msg),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_MISSING",
                "Authentication required".into(),
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_INVALID",
                "Invalid or expired token".into(),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid username or password".into(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            AppError::UsernameTaken => (
                StatusCode::CONFLICT,
                "USERNAME_TAKEN",
                "Username is already taken".into(),
            ),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An unexpected error occurred".into(),
                )
            }
        };
        (status, ErrorBody { code, error })
    }

    /// The user-facing message, as it would appear in the response body.
    pub fn public_message(self) -> String {
        self.status_and_body().1.error
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => AppError::NotFound("Image file not found".into()),
            StorageError::SizeLimitExceeded { limit, .. } => {
                AppError::FileTooLarge(format!("File exceeds maximum size of {limit} bytes"))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<GalleryError> for AppError {
    fn from(err: GalleryError) -> Self {
        match err {
            GalleryError::InvalidInput(msg) => AppError::Validation(msg),
            GalleryError::InvalidFileType(_) => AppError::InvalidFileType(
                "Invalid file type. Only JPEG, PNG, GIF, and WebP are allowed.".into(),
            ),
            GalleryError::DuplicateUpload => AppError::DuplicateUpload(
                "File already exists! Duplicate upload is not allowed.".into(),
            ),
            GalleryError::FileTooLarge { limit, .. } => {
                AppError::FileTooLarge(format!("File exceeds maximum size of {limit} bytes"))
            }
            GalleryError::NotFound(id) => {
                tracing::debug!(%id, "Image lookup failed");
                AppError::NotFound("Image not found".into())
            }
            GalleryError::NotTrashed => AppError::Conflict("Image is not in trash".into()),
            GalleryError::OwnershipViolation => {
                AppError::Conflict("Image does not belong to the user".into())
            }
            GalleryError::Storage(e) => AppError::from(e),
            GalleryError::Database(e) => AppError::from(e),
        }
    }
}
