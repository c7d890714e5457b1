//! Image lifecycle: record queries and the upload / flag / trash state machine.

mod error;
mod service;
mod store;

pub use error::GalleryError;
pub use service::{
    ALLOWED_CONTENT_TYPES, GalleryService, ImageStats, NewUpload, UploadPolicy,
    is_valid_content_type,
};
pub use store::{ImageFilter, ImageStore, PageRequest, SortField, SortOrder};
