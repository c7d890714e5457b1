use std::io::Cursor;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;
use super::key::StorageKey;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Key-addressed blob storage. Keys are chosen by the caller.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `key`.
    async fn put(&self, key: &StorageKey, data: &[u8]) -> Result<u64, StorageError> {
        let reader: BoxReader = Box::new(Cursor::new(data.to_vec()));
        self.put_stream(key, reader).await
    }

    /// Store data from an async reader under `key` and return the number of
    /// bytes written. Fails with `KeyInUse` if the key is already taken.
    async fn put_stream(&self, key: &StorageKey, reader: BoxReader) -> Result<u64, StorageError>;

    /// Retrieve all bytes stored under `key`.
    async fn get(&self, key: &StorageKey) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get_stream(key).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Retrieve a blob as a streaming async reader.
    async fn get_stream(&self, key: &StorageKey) -> Result<BoxReader, StorageError>;

    /// Check whether a blob exists.
    async fn exists(&self, key: &StorageKey) -> Result<bool, StorageError>;

    /// Delete the blob stored under `key`.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    async fn delete(&self, key: &StorageKey) -> Result<bool, StorageError>;
}
