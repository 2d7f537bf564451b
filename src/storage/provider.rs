use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Storage provider trait
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Upload data to storage
    async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> Result<()>;

    /// Download data from storage
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Delete data from storage. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a blob exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// The locator recorded in metadata: a public URL for remote storage,
    /// a server-local path for disk storage
    fn locator(&self, key: &str) -> String;

    /// Get the storage type name
    fn backend_type(&self) -> &'static str;
}
