pub mod gcs;
pub mod local;
pub mod provider;

pub use gcs::GcsStorage;
pub use local::LocalStorage;
pub use provider::StorageProvider;

use std::sync::Arc;

use crate::config::{Config, StorageBackend};
use crate::error::{AppError, Result};

/// Build the blob backend selected by configuration
pub fn from_config(config: &Config) -> Result<Arc<dyn StorageProvider>> {
    match config.storage.backend {
        StorageBackend::Local => Ok(Arc::new(LocalStorage::new(config.storage.local.clone()))),
        StorageBackend::Gcs => {
            let gcs = config.storage.gcs.clone();
            if gcs.bucket.is_empty() {
                return Err(AppError::Internal(
                    "storage.gcs.bucket is not configured".to_string(),
                ));
            }
            Ok(Arc::new(GcsStorage::new(gcs)))
        }
    }
}
