use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::LocalStorageConfig;
use crate::error::{AppError, Result};
use crate::storage::StorageProvider;

/// Local file system storage provider
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(config: LocalStorageConfig) -> Self {
        Self {
            base_path: PathBuf::from(config.base_path),
        }
    }

    fn get_full_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }
}

#[async_trait]
impl StorageProvider for LocalStorage {
    async fn put(&self, key: &str, data: Bytes, _content_type: Option<&str>) -> Result<()> {
        let full_path = self.get_full_path(key);

        // Ensure parent directory exists
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create upload dir: {}", e)))?;
        }

        // Write file
        let mut file = fs::File::create(&full_path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create {:?}: {}", full_path, e)))?;
        file.write_all(&data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write {:?}: {}", full_path, e)))?;
        file.flush()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to flush {:?}: {}", full_path, e)))?;

        tracing::debug!("Saved file to {:?}", full_path);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let full_path = self.get_full_path(key);

        let data = fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound("File not found".to_string())
            } else {
                AppError::Storage(format!("Failed to read file: {}", e))
            }
        })?;

        Ok(Bytes::from(data))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let full_path = self.get_full_path(key);

        match fs::remove_file(&full_path).await {
            Ok(()) => {
                tracing::debug!("Deleted file {:?}", full_path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to delete {:?}: {}",
                full_path, e
            ))),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let full_path = self.get_full_path(key);
        Ok(full_path.exists())
    }

    fn locator(&self, key: &str) -> String {
        self.get_full_path(key).to_string_lossy().into_owned()
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(temp: &TempDir) -> LocalStorage {
        LocalStorage::new(LocalStorageConfig {
            base_path: temp.path().to_string_lossy().into_owned(),
        })
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp);

        storage
            .put("1700-aa.txt", Bytes::from_static(b"hello"), Some("text/plain"))
            .await
            .unwrap();

        assert!(storage.exists("1700-aa.txt").await.unwrap());
        let data = storage.get("1700-aa.txt").await.unwrap();
        assert_eq!(&data[..], b"hello");
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp);

        let err = storage.get("nope.bin").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp);

        storage
            .put("gone.bin", Bytes::from_static(b"x"), None)
            .await
            .unwrap();
        storage.delete("gone.bin").await.unwrap();
        assert!(!storage.exists("gone.bin").await.unwrap());

        // Second delete is a no-op
        storage.delete("gone.bin").await.unwrap();
    }

    #[test]
    fn locator_is_relative_path_under_base() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp);
        let locator = storage.locator("a.txt");
        assert!(locator.ends_with("a.txt"));
        assert!(locator.starts_with(temp.path().to_string_lossy().as_ref()));
    }
}
