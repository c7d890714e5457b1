use std::path::PathBuf;

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::extract::multipart::{Field, MultipartError};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, body::Body};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::entity::image;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::gallery::NewUpload;
use crate::models::image::{
    ArchiveResponse, FavoriteResponse, ImageListQuery, ImageListResponse, ImageResponse,
    MultiUploadResponse, RestoreResponse, SearchQuery, StatsResponse, UploadFailure,
    UploadResponse, UploadSuccess, to_responses,
};
use crate::models::shared::{MessageResponse, Pagination};
use crate::state::AppState;

pub fn upload_body_limit(max_request_size: usize) -> DefaultBodyLimit {
    DefaultBodyLimit::max(max_request_size)
}

#[utoipa::path(
    post,
    path = "/images/upload",
    tag = "Images",
    operation_id = "uploadImage",
    summary = "Upload one image",
    description = "Uploads the `file` multipart field. The content is checksummed and rejected if \
        the caller already owns an image with identical bytes. Only JPEG, PNG, GIF and WebP are \
        accepted.",
    request_body(content_type = "multipart/form-data", description = "Image file in field `file`"),
    responses(
        (status = 200, description = "Image stored", body = UploadResponse),
        (status = 400, description = "Empty file, bad type or duplicate (VALIDATION_ERROR, INVALID_FILE_TYPE, DUPLICATE_UPLOAD)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 413, description = "File too large (FILE_TOO_LARGE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(user_id = auth_user.user_id))]
pub async fn upload_image(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let limit = state.config.storage.max_upload_size;
    let mut staged: Option<StagedFile> = None;

    while let Some(field) = next_field(&mut multipart).await? {
        if field.name() == Some("file") && staged.is_none() {
            staged = Some(StagedFile::from_field(field, limit).await?);
        }
    }

    let staged =
        staged.ok_or_else(|| AppError::Validation("Please select a file to upload".into()))?;
    let result = ingest(&state, auth_user.user_id, &staged).await;
    staged.remove().await;

    Ok(Json(UploadResponse {
        message: "Image uploaded successfully".into(),
        image: result?.into(),
    }))
}

#[utoipa::path(
    post,
    path = "/images/upload/multiple",
    tag = "Images",
    operation_id = "uploadImages",
    summary = "Upload several images",
    description = "Uploads every `files` (or `files[]`) multipart field independently. A failing \
        file is reported in `errors` and never aborts the rest of the batch.",
    request_body(content_type = "multipart/form-data", description = "Image files in field `files`"),
    responses(
        (status = 200, description = "Per-file outcomes", body = MultiUploadResponse),
        (status = 400, description = "Malformed multipart body (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(user_id = auth_user.user_id))]
pub async fn upload_images(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MultiUploadResponse>, AppError> {
    let limit = state.config.storage.max_upload_size;
    let mut results = Vec::new();
    let mut errors = Vec::new();
    let mut index = 0usize;

    loop {
        let field = match next_field(&mut multipart).await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            // Files already handled keep their outcomes; the unreadable
            // remainder is reported as one failure.
            Err(e) if index > 0 => {
                warn!(index, "Multipart body ended early: {e:?}");
                errors.push(UploadFailure {
                    index,
                    filename: "unknown".into(),
                    error: e.public_message(),
                });
                index += 1;
                break;
            }
            Err(e) => return Err(e),
        };
        if !matches!(field.name(), Some("files") | Some("files[]")) {
            continue;
        }
        let filename = field.file_name().unwrap_or("unknown").to_string();

        let mut body_broken = false;
        let outcome = match StagedFile::from_field(field, limit).await {
            Ok(staged) => {
                let result = ingest(&state, auth_user.user_id, &staged).await;
                staged.remove().await;
                result
            }
            Err(StageError::Body(e)) => {
                body_broken = true;
                Err(e)
            }
            Err(StageError::Rejected(e)) => Err(e),
        };

        match outcome {
            Ok(image) => results.push(UploadSuccess {
                index,
                filename,
                status: "success".into(),
                image: image.into(),
            }),
            Err(e) => errors.push(UploadFailure {
                index,
                filename,
                error: e.public_message(),
            }),
        }
        index += 1;

        // Nothing after a failed body read can be parsed.
        if body_broken {
            break;
        }
    }

    if index == 0 {
        return Err(AppError::Validation("Please select files to upload".into()));
    }

    Ok(Json(MultiUploadResponse {
        message: format!(
            "Processed {index} files: {} successful, {} failed",
            results.len(),
            errors.len()
        ),
        successful: results.len(),
        failed: errors.len(),
        results,
        errors,
    }))
}

#[utoipa::path(
    get,
    path = "/images",
    tag = "Images",
    operation_id = "listImages",
    summary = "List active images with pagination",
    description = "Returns the caller's images that are neither trashed nor archived. Sort by \
        `createdAt` (default), `originalName` or `sizeBytes`; direction defaults to `desc`.",
    params(ImageListQuery),
    responses(
        (status = 200, description = "One page of images", body = ImageListResponse),
        (status = 400, description = "Bad sort parameters (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(user_id = auth_user.user_id))]
pub async fn list_images(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ImageListQuery>,
) -> Result<Json<ImageListResponse>, AppError> {
    let request = query.to_page_request()?;
    let (rows, total) = state.gallery().page(auth_user.user_id, &request).await?;

    Ok(Json(ImageListResponse {
        data: to_responses(rows),
        pagination: Pagination::new(request.page, request.size, total),
    }))
}

#[utoipa::path(
    get,
    path = "/images/{id}",
    tag = "Images",
    operation_id = "getImage",
    summary = "Get image metadata",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Image metadata", body = ImageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Missing, foreign or trashed (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn get_image(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ImageResponse>, AppError> {
    let image = state.gallery().get_by_id(id, auth_user.user_id).await?;
    Ok(Json(image.into()))
}

#[utoipa::path(
    get,
    path = "/images/{id}/download",
    tag = "Images",
    operation_id = "downloadImage",
    summary = "Download the original file",
    description = "Streams the stored bytes as an attachment. Supports ETag-based caching via \
        If-None-Match.",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Image content"),
        (status = 304, description = "Not Modified (ETag match)"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Missing, foreign or trashed (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, headers), fields(user_id = auth_user.user_id))]
pub async fn download_image(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let image = state.gallery().get_by_id(id, auth_user.user_id).await?;
    build_image_response(&state, &image, &headers, Disposition::Attachment).await
}

#[utoipa::path(
    get,
    path = "/images/{id}/thumbnail",
    tag = "Images",
    operation_id = "getThumbnail",
    summary = "Render an image inline",
    description = "Streams the stored bytes for inline display. Unlike the download route, trashed \
        images are served so the trash view can show them.",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Image content"),
        (status = 304, description = "Not Modified (ETag match)"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Missing or foreign (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, headers), fields(user_id = auth_user.user_id))]
pub async fn get_thumbnail(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let image = state.gallery().thumbnail_source(id, auth_user.user_id).await?;
    build_image_response(&state, &image, &headers, Disposition::Inline).await
}

#[utoipa::path(
    put,
    path = "/images/{id}/favorite",
    tag = "Images",
    operation_id = "toggleFavorite",
    summary = "Toggle the favorite flag",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses(
        (status = 200, description = "New favorite state", body = FavoriteResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Missing, foreign or trashed (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn toggle_favorite(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FavoriteResponse>, AppError> {
    let image = state.gallery().toggle_favorite(id, auth_user.user_id).await?;
    Ok(Json(FavoriteResponse {
        message: "Favorite status updated".into(),
        is_favorite: image.favorite,
    }))
}

#[utoipa::path(
    put,
    path = "/images/{id}/archive",
    tag = "Images",
    operation_id = "toggleArchive",
    summary = "Toggle the archived flag",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses(
        (status = 200, description = "New archived state", body = ArchiveResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Missing, foreign or trashed (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn toggle_archive(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ArchiveResponse>, AppError> {
    let image = state.gallery().toggle_archive(id, auth_user.user_id).await?;
    Ok(Json(ArchiveResponse {
        message: "Archive status updated".into(),
        is_archived: image.archived,
    }))
}

#[utoipa::path(
    delete,
    path = "/images/{id}",
    tag = "Images",
    operation_id = "trashImage",
    summary = "Move an image to trash",
    description = "Soft delete. A trashed image disappears from every listing except the trash \
        and can be restored.",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Moved to trash", body = MessageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Missing, foreign or already trashed (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn trash_image(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.gallery().move_to_trash(id, auth_user.user_id).await?;
    Ok(Json(MessageResponse::new("Item moved to trash")))
}

#[utoipa::path(
    put,
    path = "/images/{id}/restore",
    tag = "Images",
    operation_id = "restoreImage",
    summary = "Restore an image from trash",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Restored image", body = RestoreResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Image not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Not in trash or not owned (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn restore_image(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RestoreResponse>, AppError> {
    let image = state.gallery().restore_from_trash(id, auth_user.user_id).await?;
    Ok(Json(RestoreResponse {
        message: "Item restored from trash".into(),
        image: image.into(),
    }))
}

#[utoipa::path(
    delete,
    path = "/images/{id}/permanent",
    tag = "Images",
    operation_id = "deleteImagePermanently",
    summary = "Delete an image for good",
    description = "Removes the stored file and the metadata row. Works on trashed and active \
        images alike. Irreversible.",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Image not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Not owned (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn delete_image_permanently(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.gallery().delete_permanently(id, auth_user.user_id).await?;
    Ok(Json(MessageResponse::new("Item permanently deleted")))
}

#[utoipa::path(
    get,
    path = "/images/favorites",
    tag = "Images",
    operation_id = "listFavorites",
    summary = "List favorite images",
    responses(
        (status = 200, description = "Favorites, newest first", body = Vec<ImageResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn list_favorites(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ImageResponse>>, AppError> {
    let rows = state.gallery().list_favorites(auth_user.user_id).await?;
    Ok(Json(to_responses(rows)))
}

#[utoipa::path(
    get,
    path = "/images/archived",
    tag = "Images",
    operation_id = "listArchived",
    summary = "List archived images",
    responses(
        (status = 200, description = "Archived images, newest first", body = Vec<ImageResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn list_archived(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ImageResponse>>, AppError> {
    let rows = state.gallery().list_archived(auth_user.user_id).await?;
    Ok(Json(to_responses(rows)))
}

#[utoipa::path(
    get,
    path = "/images/trash",
    tag = "Images",
    operation_id = "listTrash",
    summary = "List trashed images",
    responses(
        (status = 200, description = "Trashed images, newest first", body = Vec<ImageResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn list_trash(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ImageResponse>>, AppError> {
    let rows = state.gallery().list_trashed(auth_user.user_id).await?;
    Ok(Json(to_responses(rows)))
}

#[utoipa::path(
    get,
    path = "/images/search",
    tag = "Images",
    operation_id = "searchImages",
    summary = "Search images by filename",
    description = "Case-insensitive substring match on the original filename. Trashed images are \
        excluded; an empty query returns every non-trashed image.",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching images, newest first", body = Vec<ImageResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(user_id = auth_user.user_id))]
pub async fn search_images(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ImageResponse>>, AppError> {
    let rows = state
        .gallery()
        .search(auth_user.user_id, &query.query)
        .await?;
    Ok(Json(to_responses(rows)))
}

#[utoipa::path(
    get,
    path = "/images/stats",
    tag = "Images",
    operation_id = "imageStats",
    summary = "Count images by state",
    responses(
        (status = 200, description = "Counts", body = StatsResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn image_stats(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, AppError> {
    let stats = state.gallery().stats(auth_user.user_id).await?;
    Ok(Json(stats.into()))
}

async fn next_field(multipart: &mut Multipart) -> Result<Option<Field<'_>>, AppError> {
    multipart.next_field().await.map_err(multipart_error)
}

/// Body-limit failures surface as `FILE_TOO_LARGE`, anything else as a bad request.
fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::FileTooLarge(format!("Request body too large: {}", e.body_text()))
    } else {
        AppError::Validation(format!("Multipart error: {}", e.body_text()))
    }
}

/// Why a multipart file could not be staged.
enum StageError {
    /// The request body itself failed; later fields are unreadable.
    Body(AppError),
    /// This file was refused but the body is still intact.
    Rejected(AppError),
}

impl From<StageError> for AppError {
    fn from(e: StageError) -> Self {
        match e {
            StageError::Body(e) | StageError::Rejected(e) => e,
        }
    }
}

/// Hand a staged file to the lifecycle engine.
async fn ingest(
    state: &AppState,
    owner_id: i32,
    staged: &StagedFile,
) -> Result<image::Model, AppError> {
    let upload = NewUpload {
        source: &staged.path,
        size: staged.size,
        content_type: &staged.content_type,
        original_name: &staged.filename,
    };
    Ok(state.gallery().upload(owner_id, upload).await?)
}

/// A multipart file spooled to a local temp file.
struct StagedFile {
    path: PathBuf,
    size: u64,
    filename: String,
    content_type: String,
}

impl StagedFile {
    /// Stream `field` to disk in chunks, refusing anything over `max_size`.
    async fn from_field(mut field: Field<'_>, max_size: u64) -> Result<Self, StageError> {
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let path = std::env::temp_dir().join(format!("photovault-upload-{}", Uuid::new_v4()));

        let result = async {
            let mut temp_file = tokio::fs::File::create(&path)
                .await
                .map_err(|e| {
                    StageError::Rejected(AppError::Internal(format!(
                        "Failed to create temp file: {e}"
                    )))
                })?;

            let mut total_size: u64 = 0;
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| StageError::Body(multipart_error(e)))?
            {
                total_size += chunk.len() as u64;
                // Past the limit the rest of the field is read and dropped so
                // the client still gets a response.
                if total_size > max_size {
                    continue;
                }
                temp_file
                    .write_all(&chunk)
                    .await
                    .map_err(|e| {
                        StageError::Rejected(AppError::Internal(format!(
                            "Temp file write failed: {e}"
                        )))
                    })?;
            }
            if total_size > max_size {
                return Err(StageError::Rejected(AppError::FileTooLarge(format!(
                    "File exceeds maximum size of {max_size} bytes"
                ))));
            }

            temp_file
                .flush()
                .await
                .map_err(|e| {
                    StageError::Rejected(AppError::Internal(format!(
                        "Temp file flush failed: {e}"
                    )))
                })?;
            Ok(total_size)
        }
        .await;

        match result {
            Ok(size) => Ok(Self {
                path,
                size,
                filename,
                content_type,
            }),
            Err(e) => {
                // Best effort.
                let _ = tokio::fs::remove_file(&path).await;
                Err(e)
            }
        }
    }

    async fn remove(self) {
        // Best effort.
        let _ = tokio::fs::remove_file(&self.path).await;
    }
}

#[derive(Clone, Copy)]
enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    fn as_str(self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        }
    }
}

/// Build a streaming response for an image's stored bytes.
async fn build_image_response(
    state: &AppState,
    image: &image::Model,
    headers: &HeaderMap,
    disposition: Disposition,
) -> Result<Response, AppError> {
    let etag_value = format!("\"{}\"", image.checksum);
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && let Ok(val) = if_none_match.to_str()
        && (val == etag_value || val == "*")
    {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let reader = state.gallery().open(image).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &image.content_type)
        .header(header::CONTENT_LENGTH, image.size_bytes.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(disposition, &image.original_name),
        )
        .header(header::ETAG, &etag_value)
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))?;

    Ok(response)
}

/// Build a safe `Content-Disposition` header value.
fn content_disposition_value(disposition: Disposition, filename: &str) -> String {
    let ascii_safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii_name = if ascii_safe.is_empty() {
        "image".to_string()
    } else {
        ascii_safe
    };

    // RFC 5987 percent-encoding for filename*.
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'!' | b'#' | b'$' | b'&' | b'+' | b'-'
            | b'.' | b'^' | b'_' | b'`' | b'|' | b'~' => String::from(b as char),
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!(
        "{}; filename=\"{ascii_name}\"; filename*=UTF-8''{encoded}",
        disposition.as_str()
    )
}
