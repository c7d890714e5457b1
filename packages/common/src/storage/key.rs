use std::fmt;

use super::error::StorageError;

/// Longest extension carried over from an original filename.
const MAX_EXTENSION_LEN: usize = 16;

/// Opaque name under which a blob's bytes are stored.
///
/// A key is a single flat path component: it never contains separators,
/// parent-directory segments, control characters, or a leading dot.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// Generate a fresh key for an upload: a random UUID plus the extension
    /// of `original_name` (the text after its last `.`), if any.
    pub fn generate(original_name: &str) -> Self {
        let ext = extension_of(original_name);
        let id = uuid::Uuid::new_v4();
        if ext.is_empty() {
            Self(id.to_string())
        } else {
            Self(format!("{id}.{ext}"))
        }
    }

    /// Validate an existing key, e.g. one read back from the database.
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        if raw.is_empty() {
            return Err(StorageError::InvalidKey("key is empty".into()));
        }
        if raw.contains('/') || raw.contains('\\') {
            return Err(StorageError::InvalidKey(
                "path separators are not allowed".into(),
            ));
        }
        if raw.contains("..") {
            return Err(StorageError::InvalidKey(
                "parent directory segments are not allowed".into(),
            ));
        }
        if raw.chars().any(|c| c.is_control()) {
            return Err(StorageError::InvalidKey(
                "control characters are not allowed".into(),
            ));
        }
        if raw.starts_with('.') {
            return Err(StorageError::InvalidKey(
                "hidden names are not allowed".into(),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lowercased extension of `name`, restricted to ASCII alphanumerics.
///
/// Anything unusual (no dot, empty, too long, odd characters) yields an
/// empty extension rather than an error; the original name is display-only.
fn extension_of(name: &str) -> String {
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return String::new();
    };
    if stem.is_empty()
        || ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return String::new();
    }
    ext.to_ascii_lowercase()
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageKey({})", self.0)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
