use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use super::error::StorageError;
use super::key::StorageKey;
use super::traits::{BlobStore, BoxReader};

/// Directory under the root where in-flight writes are staged.
const STAGING_DIR: &str = ".tmp";

/// Filesystem-backed blob store.
///
/// Every blob is a flat file `{root}/{key}`. Writes are staged under
/// `{root}/.tmp` and linked into place only once complete, so a reader never
/// observes a partially written blob and an existing key is never replaced.
pub struct FilesystemBlobStore {
    root: PathBuf,
    max_size: u64,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store, creating `root` if it is missing.
    pub async fn new(root: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(root.join(STAGING_DIR)).await?;
        let root = fs::canonicalize(&root).await?;
        info!("Blob storage directory: {}", root.display());
        Ok(Self { root, max_size })
    }

    /// The canonical storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to its path, refusing anything outside the root.
    fn blob_path(&self, key: &StorageKey) -> Result<PathBuf, StorageError> {
        let key = StorageKey::parse(key.as_str())?;
        let path = self.root.join(key.as_str());
        if !path.starts_with(&self.root) || path.parent() != Some(self.root.as_path()) {
            return Err(StorageError::InvalidKey(format!(
                "{key} resolves outside the storage root"
            )));
        }
        Ok(path)
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.root
            .join(STAGING_DIR)
            .join(uuid::Uuid::new_v4().to_string())
    }

    async fn write_temp(&self, temp_path: &Path, mut reader: BoxReader) -> Result<u64, StorageError> {
        let mut temp_file = fs::File::create(temp_path).await?;
        let mut total_bytes: u64 = 0;
        let mut buf = vec![0u8; 64 * 1024]; // 64KB read buffer

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }

            total_bytes += n as u64;
            if total_bytes > self.max_size {
                return Err(StorageError::SizeLimitExceeded {
                    actual: total_bytes,
                    limit: self.max_size,
                });
            }

            temp_file.write_all(&buf[..n]).await?;
        }

        temp_file.flush().await?;
        temp_file.sync_all().await?;
        Ok(total_bytes)
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put_stream(&self, key: &StorageKey, reader: BoxReader) -> Result<u64, StorageError> {
        let blob_path = self.blob_path(key)?;
        if fs::try_exists(&blob_path).await? {
            return Err(StorageError::KeyInUse(key.to_string()));
        }

        let temp_path = self.temp_path();
        let written = match self.write_temp(&temp_path, reader).await {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e);
            }
        };

        // hard_link refuses to clobber, unlike rename.
        let linked = fs::hard_link(&temp_path, &blob_path).await;
        let _ = fs::remove_file(&temp_path).await;
        match linked {
            Ok(()) => Ok(written),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StorageError::KeyInUse(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_stream(&self, key: &StorageKey) -> Result<BoxReader, StorageError> {
        let blob_path = self.blob_path(key)?;
        match fs::File::open(&blob_path).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &StorageKey) -> Result<bool, StorageError> {
        let blob_path = self.blob_path(key)?;
        Ok(fs::try_exists(&blob_path).await?)
    }

    async fn delete(&self, key: &StorageKey) -> Result<bool, StorageError> {
        let blob_path = self.blob_path(key)?;
        match fs::remove_file(&blob_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
