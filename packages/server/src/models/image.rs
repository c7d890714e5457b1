use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::image;
use crate::error::AppError;
use crate::gallery::{ImageStats, PageRequest, SortField, SortOrder};

use super::shared::Pagination;

/// Largest page size a client may request.
const MAX_PAGE_SIZE: u64 = 100;
const DEFAULT_PAGE_SIZE: u64 = 10;

/// Image metadata as returned by the API. The storage key stays internal.
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    #[schema(example = "01927b0e-8f3a-7c44-9d2e-3b5f0a1c2d4e")]
    pub id: Uuid,
    #[schema(example = "photo.png")]
    pub original_name: String,
    #[schema(example = "image/png")]
    pub content_type: String,
    #[schema(example = 500000)]
    pub size_bytes: i64,
    /// Hex SHA-256 of the content.
    #[schema(example = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")]
    pub checksum: String,
    #[schema(example = false)]
    pub favorite: bool,
    #[schema(example = false)]
    pub archived: bool,
    #[schema(example = false)]
    pub trashed: bool,
    #[schema(example = "2025-09-01T08:00:00Z")]
    pub created_at: DateTime<Utc>,
    #[schema(example = "2025-09-01T08:00:00Z")]
    pub updated_at: DateTime<Utc>,
}

impl From<image::Model> for ImageResponse {
    fn from(m: image::Model) -> Self {
        Self {
            id: m.id,
            original_name: m.original_name,
            content_type: m.content_type,
            size_bytes: m.size_bytes,
            checksum: m.checksum,
            favorite: m.favorite,
            archived: m.archived,
            trashed: m.trashed,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Convert a list of rows into response items.
pub fn to_responses(rows: Vec<image::Model>) -> Vec<ImageResponse> {
    rows.into_iter().map(ImageResponse::from).collect()
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct UploadResponse {
    #[schema(example = "Image uploaded successfully")]
    pub message: String,
    pub image: ImageResponse,
}

/// Outcome of a batch upload. One bad file never fails the batch.
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct MultiUploadResponse {
    #[schema(example = "Uploaded 2 of 3 files")]
    pub message: String,
    #[schema(example = 2)]
    pub successful: usize,
    #[schema(example = 1)]
    pub failed: usize,
    pub results: Vec<UploadSuccess>,
    pub errors: Vec<UploadFailure>,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct UploadSuccess {
    /// Position of the file in the request (0-based).
    #[schema(example = 0)]
    pub index: usize,
    #[schema(example = "photo.png")]
    pub filename: String,
    #[schema(example = "success")]
    pub status: String,
    pub image: ImageResponse,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct UploadFailure {
    #[schema(example = 1)]
    pub index: usize,
    #[schema(example = "notes.txt")]
    pub filename: String,
    #[schema(example = "Invalid file type. Only JPEG, PNG, GIF, and WebP are allowed.")]
    pub error: String,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteResponse {
    #[schema(example = "Image added to favorites")]
    pub message: String,
    #[schema(example = true)]
    pub is_favorite: bool,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveResponse {
    #[schema(example = "Image archived")]
    pub message: String,
    #[schema(example = true)]
    pub is_archived: bool,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct RestoreResponse {
    #[schema(example = "Image restored successfully")]
    pub message: String,
    pub image: ImageResponse,
}

/// Per-user counts. `total` excludes trashed and archived images.
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct StatsResponse {
    #[schema(example = 12)]
    pub total: u64,
    #[schema(example = 3)]
    pub favorites: u64,
    #[schema(example = 2)]
    pub archived: u64,
    #[schema(example = 1)]
    pub trash: u64,
}

impl From<ImageStats> for StatsResponse {
    fn from(s: ImageStats) -> Self {
        Self {
            total: s.total,
            favorites: s.favorites,
            archived: s.archived,
            trash: s.trash,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ImageListResponse {
    pub data: Vec<ImageResponse>,
    pub pagination: Pagination,
}

/// Query parameters for the paginated image list.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ImageListQuery {
    /// Page number (1-based, default 1).
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Items per page (1-100, default 10).
    #[param(example = 10)]
    pub size: Option<u64>,
    /// `createdAt` (default), `originalName` or `sizeBytes`.
    #[param(example = "createdAt")]
    pub sort_by: Option<String>,
    /// `asc` or `desc` (default).
    #[param(example = "desc")]
    pub sort_dir: Option<String>,
}

impl ImageListQuery {
    pub fn to_page_request(&self) -> Result<PageRequest, AppError> {
        let page = Ord::max(self.page.unwrap_or(1), 1);
        let size = self
            .size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let sort = match self.sort_by.as_deref() {
            None | Some("") => SortField::default(),
            Some(raw) => SortField::parse(raw).ok_or_else(|| {
                AppError::Validation(
                    "sortBy must be one of: createdAt, originalName, sizeBytes".into(),
                )
            })?,
        };
        let order = match self.sort_dir.as_deref() {
            None | Some("") => SortOrder::default(),
            Some(raw) => SortOrder::parse(raw)
                .ok_or_else(|| AppError::Validation("sortDir must be asc or desc".into()))?,
        };

        let request = PageRequest {
            page,
            size,
            sort,
            order,
        };
        if request.offset().is_none() {
            return Err(AppError::Validation(format!("page {page} is out of range")));
        }
        Ok(request)
    }
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Case-insensitive substring of the original filename. Empty matches all.
    #[param(example = "beach")]
    #[serde(default)]
    pub query: String,
}
