use async_trait::async_trait;
use bytes::Bytes;

use crate::config::GcsStorageConfig;
use crate::error::Result;
use crate::storage::StorageProvider;

use super::client::Client;

/// Cloud bucket storage provider
pub struct GcsStorage {
    client: Client,
}

impl GcsStorage {
    pub fn new(config: GcsStorageConfig) -> Self {
        let client = Client::new(
            config.access_id,
            config.secret,
            config.bucket,
            config.endpoint,
        );
        Self { client }
    }
}

#[async_trait]
impl StorageProvider for GcsStorage {
    async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> Result<()> {
        let guessed;
        let content_type = match content_type {
            Some(ct) => ct,
            None => {
                guessed = mime_guess::from_path(key).first_or_octet_stream();
                guessed.as_ref()
            }
        };

        self.client.put_object(key, data, content_type).await?;
        tracing::info!("Uploaded to bucket: {}", key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        self.client.get_object(key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client.delete_object(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.client.head_object(key).await
    }

    fn locator(&self, key: &str) -> String {
        self.client.public_url(key)
    }

    fn backend_type(&self) -> &'static str {
        "gcs"
    }
}
