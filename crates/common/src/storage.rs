//! Upload storage for profile photos.
//!
//! Files are written under a single upload directory and addressed by their
//! sanitized name, so the stored path doubles as the public path.

use std::path::PathBuf;

use crate::{AppError, AppResult};

/// Stored file metadata.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Storage key (sanitized file name).
    pub key: String,
    /// Path clients use to fetch the file back.
    pub path: String,
    /// File size in bytes.
    pub size: u64,
}

/// Storage backend trait.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store a file under the given key, replacing any existing file.
    async fn store(&self, key: &str, data: &[u8]) -> AppResult<StoredFile>;

    /// Delete a file.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Get the public path for a key.
    fn public_path(&self, key: &str) -> String;

    /// Check if a file exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;
}

/// Local filesystem storage backend.
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String) -> Self {
        Self {
            base_path,
            base_url,
        }
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn store(&self, key: &str, data: &[u8]) -> AppResult<StoredFile> {
        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create directory: {e}")))?;

        let path = self.base_path.join(key);
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {e}")))?;

        tracing::debug!(key, size = data.len(), "Stored upload");

        Ok(StoredFile {
            key: key.to_string(),
            path: self.public_path(key),
            size: data.len() as u64,
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.base_path.join(key);
        if path.exists() {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to delete file: {e}")))?;
        }
        Ok(())
    }

    fn public_path(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let path = self.base_path.join(key);
        Ok(path.exists())
    }
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
#[must_use]
pub fn sanitize_filename(original_name: &str) -> String {
    original_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_keeps_safe_chars() {
        assert_eq!(sanitize_filename("photo-1_final.JPG"), "photo-1_final.JPG");
    }

    #[test]
    fn test_sanitize_filename_replaces_unsafe_chars() {
        assert_eq!(sanitize_filename("my photo (1).png"), "my_photo__1_.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_filename("café.png"), "caf_.png");
    }

    #[tokio::test]
    async fn test_local_storage_round_trip() {
        let dir = std::env::temp_dir().join(format!("safetracker-{}", uuid::Uuid::new_v4()));
        let storage = LocalStorage::new(dir.clone(), "uploads".to_string());

        let stored = storage.store("avatar.png", b"png-bytes").await.unwrap();
        assert_eq!(stored.path, "uploads/avatar.png");
        assert_eq!(stored.size, 9);
        assert!(storage.exists("avatar.png").await.unwrap());

        storage.delete("avatar.png").await.unwrap();
        assert!(!storage.exists("avatar.png").await.unwrap());

        tokio::fs::remove_dir_all(dir).await.ok();
    }

    #[test]
    fn test_public_path_trims_trailing_slash() {
        let storage = LocalStorage::new(PathBuf::from("/tmp"), "/uploads/".to_string());
        assert_eq!(storage.public_path("a.png"), "/uploads/a.png");
    }
}
