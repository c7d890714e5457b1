use std::fmt;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;

/// Read buffer used when hashing a stream.
const HASH_BUFFER_SIZE: usize = 8 * 1024;

/// A SHA-256 content hash.
///
/// Used as the per-owner identity of uploaded content for duplicate detection.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Compute the SHA-256 hash of the given data.
    pub fn compute(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(hash.into())
    }

    /// Hash everything readable from `reader` through a fixed-size buffer.
    ///
    /// Returns the digest and the number of bytes consumed. The reader is
    /// drained but otherwise untouched.
    pub async fn compute_stream<R>(reader: &mut R) -> Result<(Self, u64), StorageError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut hasher = Sha256::new();
        let mut total: u64 = 0;
        let mut buf = [0u8; HASH_BUFFER_SIZE];

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            total += n as u64;
            hasher.update(&buf[..n]);
        }

        Ok((Self(hasher.finalize().into()), total))
    }

    /// Return the hash as a 64-character lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
