use common::storage::StorageError;
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// Failures of the image lifecycle engine.
#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("content type {0:?} is not allowed")]
    InvalidFileType(String),

    #[error("an image with the same content already exists for this owner")]
    DuplicateUpload,

    #[error("upload of {actual} bytes exceeds the limit of {limit} bytes")]
    FileTooLarge { actual: u64, limit: u64 },

    /// Missing id, foreign owner, or trashed where trashed rows are hidden.
    #[error("image {0} not found")]
    NotFound(Uuid),

    #[error("image is not in trash")]
    NotTrashed,

    #[error("image does not belong to the requesting user")]
    OwnershipViolation,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Database(#[from] DbErr),
}
