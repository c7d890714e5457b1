mod error;
mod hash;
mod key;
mod traits;

pub mod filesystem;

pub use error::StorageError;
pub use filesystem::FilesystemBlobStore;
pub use hash::ContentHash;
pub use key::StorageKey;
pub use traits::{BlobStore, BoxReader};
