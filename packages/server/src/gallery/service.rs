use std::path::Path;

use chrono::Utc;
use common::storage::{BlobStore, BoxReader, ContentHash, StorageKey};
use sea_orm::{ConnectionTrait, DbErr, Set, SqlErr, TransactionSession, TransactionTrait};
use tracing::{info, warn};
use uuid::Uuid;

use super::error::GalleryError;
use super::store::{ImageFilter, ImageStore, PageRequest};
use crate::config::StorageConfig;
use crate::entity::image;
use crate::utils::filename;

/// Content types an upload may declare.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Whether `content_type` is one of [`ALLOWED_CONTENT_TYPES`].
///
/// Parameters (`; charset=...`) and letter case are ignored.
pub fn is_valid_content_type(content_type: &str) -> bool {
    let essence = essence_of(content_type);
    ALLOWED_CONTENT_TYPES.contains(&essence.as_str())
}

fn essence_of(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Limits applied to every upload.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_upload_size: u64,
}

impl UploadPolicy {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            max_upload_size: config.max_upload_size,
        }
    }
}

/// A file staged on local disk, waiting to be taken into the gallery.
///
/// The engine reads `source` twice: once to checksum it and once to store it.
#[derive(Debug, Clone, Copy)]
pub struct NewUpload<'p> {
    pub source: &'p Path,
    /// Declared byte length.
    pub size: u64,
    pub content_type: &'p str,
    pub original_name: &'p str,
}

/// Per-owner image counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageStats {
    /// Neither trashed nor archived.
    pub total: u64,
    pub favorites: u64,
    pub archived: u64,
    pub trash: u64,
}

/// How a state transition looks up its target row.
#[derive(Clone, Copy)]
enum Lookup {
    /// Owner-facing: foreign and trashed rows are `NotFound`.
    Visible,
    /// Internal lookup with an explicit ownership check.
    Owned,
}

/// The image upload and lifecycle engine.
///
/// Request-scoped: build one per request from the shared connection and
/// blob store. The owner is always passed explicitly.
pub struct GalleryService<'a, C: ConnectionTrait + TransactionTrait> {
    conn: &'a C,
    blobs: &'a dyn BlobStore,
    policy: UploadPolicy,
}

impl<'a, C: ConnectionTrait + TransactionTrait> GalleryService<'a, C> {
    pub fn new(conn: &'a C, blobs: &'a dyn BlobStore, policy: UploadPolicy) -> Self {
        Self {
            conn,
            blobs,
            policy,
        }
    }

    fn store(&self) -> ImageStore<'a, C> {
        ImageStore::new(self.conn)
    }

    /// Validate, dedup, store and record a staged upload.
    ///
    /// Checks run in this order: input, size, duplicate, content type. A
    /// duplicate with a bad content type therefore reports `DuplicateUpload`.
    pub async fn upload(
        &self,
        owner_id: i32,
        upload: NewUpload<'_>,
    ) -> Result<image::Model, GalleryError> {
        if upload.size == 0 {
            return Err(GalleryError::InvalidInput(
                "Please select a file to upload".into(),
            ));
        }
        let original_name = filename::normalize_upload_filename(upload.original_name)
            .map_err(|e| GalleryError::InvalidInput(e.message().into()))?;

        let limit = self.policy.max_upload_size;
        if upload.size > limit {
            return Err(GalleryError::FileTooLarge {
                actual: upload.size,
                limit,
            });
        }

        let mut file = tokio::fs::File::open(upload.source)
            .await
            .map_err(common::storage::StorageError::from)?;
        let (hash, read) = ContentHash::compute_stream(&mut file).await?;
        drop(file);
        if read == 0 {
            return Err(GalleryError::InvalidInput(
                "Please select a file to upload".into(),
            ));
        }
        if read > limit {
            return Err(GalleryError::FileTooLarge {
                actual: read,
                limit,
            });
        }
        let checksum = hash.to_hex();

        if self
            .store()
            .find_by_checksum(owner_id, &checksum)
            .await?
            .is_some()
        {
            return Err(GalleryError::DuplicateUpload);
        }

        if !is_valid_content_type(upload.content_type) {
            return Err(GalleryError::InvalidFileType(upload.content_type.to_string()));
        }

        self.persist(owner_id, &upload, original_name, checksum)
            .await
    }

    /// Write the blob and insert its row. The unique `(owner_id, checksum)`
    /// index is the final dedup guard when two uploads race past the lookup.
    async fn persist(
        &self,
        owner_id: i32,
        upload: &NewUpload<'_>,
        original_name: &str,
        checksum: String,
    ) -> Result<image::Model, GalleryError> {
        let key = StorageKey::generate(original_name);
        let file = tokio::fs::File::open(upload.source)
            .await
            .map_err(common::storage::StorageError::from)?;
        let reader: BoxReader = Box::new(file);
        let written = self.blobs.put_stream(&key, reader).await?;

        let now = Utc::now();
        let model = image::ActiveModel {
            id: Set(Uuid::now_v7()),
            owner_id: Set(owner_id),
            original_name: Set(original_name.to_string()),
            storage_key: Set(key.as_str().to_string()),
            size_bytes: Set(written as i64),
            content_type: Set(essence_of(upload.content_type)),
            checksum: Set(checksum),
            favorite: Set(false),
            archived: Set(false),
            trashed: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        match self.store().insert(model).await {
            Ok(image) => {
                info!(image_id = %image.id, owner_id, size = written, "Image uploaded");
                Ok(image)
            }
            Err(e) => {
                self.discard_blob(&key).await;
                Err(map_insert_error(e))
            }
        }
    }

    async fn discard_blob(&self, key: &StorageKey) {
        if let Err(e) = self.blobs.delete(key).await {
            warn!(key = %key, error = %e, "Failed to remove blob of rejected upload");
        }
    }

    /// Fetch by id only. No owner or trash filtering.
    pub async fn get_by_id_internal(&self, id: Uuid) -> Result<image::Model, GalleryError> {
        self.store()
            .find_by_id(id)
            .await?
            .ok_or(GalleryError::NotFound(id))
    }

    /// Fetch an image the owner can see: foreign and trashed images are `NotFound`.
    pub async fn get_by_id(&self, id: Uuid, owner_id: i32) -> Result<image::Model, GalleryError> {
        let image = self.get_by_id_internal(id).await?;
        check_visible(&image, owner_id)?;
        Ok(image)
    }

    /// Fetch an image for thumbnail rendering. Trashed images are allowed.
    pub async fn thumbnail_source(
        &self,
        id: Uuid,
        owner_id: i32,
    ) -> Result<image::Model, GalleryError> {
        let image = self.get_by_id_internal(id).await?;
        if image.owner_id != owner_id {
            return Err(GalleryError::NotFound(id));
        }
        Ok(image)
    }

    /// Open the stored bytes of an image.
    pub async fn open(&self, image: &image::Model) -> Result<BoxReader, GalleryError> {
        let key = StorageKey::parse(&image.storage_key)?;
        Ok(self.blobs.get_stream(&key).await?)
    }

    pub async fn list_active(&self, owner_id: i32) -> Result<Vec<image::Model>, GalleryError> {
        Ok(self.store().list(owner_id, &ImageFilter::Active).await?)
    }

    pub async fn list_favorites(&self, owner_id: i32) -> Result<Vec<image::Model>, GalleryError> {
        Ok(self.store().list(owner_id, &ImageFilter::Favorites).await?)
    }

    pub async fn list_archived(&self, owner_id: i32) -> Result<Vec<image::Model>, GalleryError> {
        Ok(self.store().list(owner_id, &ImageFilter::Archived).await?)
    }

    pub async fn list_trashed(&self, owner_id: i32) -> Result<Vec<image::Model>, GalleryError> {
        Ok(self.store().list(owner_id, &ImageFilter::Trashed).await?)
    }

    /// Case-insensitive substring search on the original name. Empty terms
    /// match every non-trashed image.
    pub async fn search(
        &self,
        owner_id: i32,
        term: &str,
    ) -> Result<Vec<image::Model>, GalleryError> {
        Ok(self
            .store()
            .list(owner_id, &ImageFilter::Search(term.to_string()))
            .await?)
    }

    pub async fn page(
        &self,
        owner_id: i32,
        request: &PageRequest,
    ) -> Result<(Vec<image::Model>, u64), GalleryError> {
        Ok(self.store().page(owner_id, request).await?)
    }

    pub async fn stats(&self, owner_id: i32) -> Result<ImageStats, GalleryError> {
        let store = self.store();
        Ok(ImageStats {
            total: store.count(owner_id, &ImageFilter::Active).await?,
            favorites: store.count(owner_id, &ImageFilter::Favorites).await?,
            archived: store.count(owner_id, &ImageFilter::Archived).await?,
            trash: store.count(owner_id, &ImageFilter::Trashed).await?,
        })
    }

    pub async fn toggle_favorite(
        &self,
        id: Uuid,
        owner_id: i32,
    ) -> Result<image::Model, GalleryError> {
        let image = self
            .transition(id, owner_id, Lookup::Visible, |current| {
                let mut active: image::ActiveModel = current.clone().into();
                active.favorite = Set(!current.favorite);
                Ok(active)
            })
            .await?;
        info!(image_id = %id, owner_id, favorite = image.favorite, "Favorite toggled");
        Ok(image)
    }

    pub async fn toggle_archive(
        &self,
        id: Uuid,
        owner_id: i32,
    ) -> Result<image::Model, GalleryError> {
        let image = self
            .transition(id, owner_id, Lookup::Visible, |current| {
                let mut active: image::ActiveModel = current.clone().into();
                active.archived = Set(!current.archived);
                Ok(active)
            })
            .await?;
        info!(image_id = %id, owner_id, archived = image.archived, "Archive toggled");
        Ok(image)
    }

    /// Soft-delete. Gated by the owner-facing lookup, so a second call on the
    /// same image is `NotFound`.
    pub async fn move_to_trash(
        &self,
        id: Uuid,
        owner_id: i32,
    ) -> Result<image::Model, GalleryError> {
        let image = self
            .transition(id, owner_id, Lookup::Visible, |current| {
                let mut active: image::ActiveModel = current.clone().into();
                active.trashed = Set(true);
                Ok(active)
            })
            .await?;
        info!(image_id = %id, owner_id, "Image moved to trash");
        Ok(image)
    }

    pub async fn restore_from_trash(
        &self,
        id: Uuid,
        owner_id: i32,
    ) -> Result<image::Model, GalleryError> {
        let image = self
            .transition(id, owner_id, Lookup::Owned, |current| {
                if !current.trashed {
                    return Err(GalleryError::NotTrashed);
                }
                let mut active: image::ActiveModel = current.clone().into();
                active.trashed = Set(false);
                Ok(active)
            })
            .await?;
        info!(image_id = %id, owner_id, "Image restored from trash");
        Ok(image)
    }

    /// Remove the blob and the row. Irreversible; trashing first is not required.
    ///
    /// A blob that cannot be deleted is logged and the row is removed anyway.
    pub async fn delete_permanently(&self, id: Uuid, owner_id: i32) -> Result<(), GalleryError> {
        let image = self.get_by_id_internal(id).await?;
        if image.owner_id != owner_id {
            return Err(GalleryError::OwnershipViolation);
        }

        match StorageKey::parse(&image.storage_key) {
            Ok(key) => match self.blobs.delete(&key).await {
                Ok(true) => {}
                Ok(false) => warn!(image_id = %id, key = %key, "Blob already missing"),
                Err(e) => warn!(image_id = %id, key = %key, error = %e, "Failed to delete blob"),
            },
            Err(e) => warn!(image_id = %id, error = %e, "Stored key is invalid; skipping blob delete"),
        }

        self.store().delete(id).await?;
        info!(image_id = %id, owner_id, "Image permanently deleted");
        Ok(())
    }

    /// Locked read-modify-write of one row in a single transaction.
    async fn transition<F>(
        &self,
        id: Uuid,
        owner_id: i32,
        lookup: Lookup,
        apply: F,
    ) -> Result<image::Model, GalleryError>
    where
        F: FnOnce(&image::Model) -> Result<image::ActiveModel, GalleryError>,
    {
        let txn = self.conn.begin().await?;
        let store = ImageStore::new(&txn);

        let current = store
            .find_by_id_for_update(id)
            .await?
            .ok_or(GalleryError::NotFound(id))?;
        match lookup {
            Lookup::Visible => check_visible(&current, owner_id)?,
            Lookup::Owned if current.owner_id != owner_id => {
                return Err(GalleryError::OwnershipViolation);
            }
            Lookup::Owned => {}
        }

        let mut active = apply(&current)?;
        active.updated_at = Set(Utc::now());
        let saved = store.save(active).await?;
        txn.commit().await?;
        Ok(saved)
    }
}

/// Ownership first, then trash. Both surface as `NotFound`.
fn check_visible(image: &image::Model, owner_id: i32) -> Result<(), GalleryError> {
    if image.owner_id != owner_id || image.trashed {
        return Err(GalleryError::NotFound(image.id));
    }
    Ok(())
}

fn map_insert_error(err: DbErr) -> GalleryError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            tracing::debug!("Duplicate upload caught by unique constraint on insert");
            GalleryError::DuplicateUpload
        }
        _ => GalleryError::Database(err),
    }
}
