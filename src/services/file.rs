use bytes::Bytes;
use chrono::Utc;
use serde_json::{Map, Value};
use std::path::Path;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::FileRecord;
use crate::storage::StorageProvider;

/// File record service
pub struct FileService;

impl FileService {
    /// Derive the storage key for an upload.
    ///
    /// Millisecond timestamp for operator-friendly ordering, a random
    /// component so concurrent uploads in the same millisecond cannot
    /// collide, and the original extension preserved.
    pub fn storage_key(original_name: &str) -> String {
        let ext = Path::new(original_name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let nonce = Uuid::new_v4().simple().to_string();
        format!("{}-{}{}", Utc::now().timestamp_millis(), &nonce[..8], ext)
    }

    /// Persist an upload: blob first, then the metadata record.
    ///
    /// If the record insert fails the blob is removed again so the two
    /// stores stay in sync.
    pub async fn store_upload(
        db: &Database,
        provider: &dyn StorageProvider,
        original_name: &str,
        content_type: Option<String>,
        data: Bytes,
    ) -> Result<FileRecord> {
        if original_name.is_empty()
            || original_name.contains('/')
            || original_name.contains('\\')
        {
            return Err(AppError::BadRequest("Invalid file name".to_string()));
        }

        let key = Self::storage_key(original_name);
        let size = data.len() as i64;

        provider.put(&key, data, content_type.as_deref()).await?;
        let locator = provider.locator(&key);

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let inserted = sqlx::query(
            r#"
            INSERT INTO files (id, filename, locator, content_type, size, attrs, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, '{}', ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&key)
        .bind(&locator)
        .bind(&content_type)
        .bind(size)
        .bind(&now)
        .bind(&now)
        .execute(db.pool())
        .await;

        if let Err(e) = inserted {
            // Compensate: the blob write already happened
            if let Err(del_err) = provider.delete(&key).await {
                tracing::error!("Failed to remove orphaned blob {}: {}", key, del_err);
            }
            return Err(e.into());
        }

        Self::get_record(db, &id).await
    }

    /// All records in insertion order
    pub async fn list_records(db: &Database) -> Result<Vec<FileRecord>> {
        let records: Vec<FileRecord> =
            sqlx::query_as("SELECT * FROM files ORDER BY created_at ASC, id ASC")
                .fetch_all(db.pool())
                .await?;
        Ok(records)
    }

    /// Get a record by ID
    pub async fn get_record(db: &Database, id: &str) -> Result<FileRecord> {
        let record: FileRecord = sqlx::query_as("SELECT * FROM files WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("Record not found".to_string()))?;

        Ok(record)
    }

    /// Find a record by its stored filename
    pub async fn find_by_filename(db: &Database, filename: &str) -> Result<Option<FileRecord>> {
        let record: Option<FileRecord> = sqlx::query_as("SELECT * FROM files WHERE filename = ?")
            .bind(filename)
            .fetch_optional(db.pool())
            .await?;
        Ok(record)
    }

    /// Merge a partial update into a record.
    ///
    /// Typed columns (`filename`, `locator`/`url`/`path`, `content_type`,
    /// `size`) are updated when present; `id` and the timestamps cannot be
    /// changed and are ignored; every other key lands in `attrs`.
    pub async fn update_record(db: &Database, id: &str, patch: Value) -> Result<FileRecord> {
        let Value::Object(patch) = patch else {
            return Err(AppError::BadRequest(
                "Update body must be a JSON object".to_string(),
            ));
        };

        let record = Self::get_record(db, id).await?;

        let mut filename = record.filename;
        let mut locator = record.locator;
        let mut content_type = record.content_type;
        let mut size = record.size;
        let mut attrs: Map<String, Value> = serde_json::from_str(&record.attrs).unwrap_or_default();

        for (field, value) in patch {
            match field.as_str() {
                "id" | "created_at" | "updated_at" => {}
                "filename" => filename = string_field(&field, value)?,
                "locator" | "url" | "path" => locator = string_field(&field, value)?,
                "content_type" => {
                    content_type = match value {
                        Value::Null => None,
                        other => Some(string_field(&field, other)?),
                    }
                }
                "size" => {
                    size = value.as_i64().ok_or_else(|| {
                        AppError::BadRequest("Field 'size' must be an integer".to_string())
                    })?;
                }
                _ => {
                    attrs.insert(field, value);
                }
            }
        }

        let attrs_json = serde_json::to_string(&attrs)
            .map_err(|e| AppError::Internal(format!("Failed to serialize attrs: {}", e)))?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "UPDATE files SET filename = ?, locator = ?, content_type = ?, size = ?, attrs = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&filename)
        .bind(&locator)
        .bind(&content_type)
        .bind(size)
        .bind(&attrs_json)
        .bind(&now)
        .bind(id)
        .execute(db.pool())
        .await?;

        Self::get_record(db, id).await
    }

    /// Delete a record and its blob.
    ///
    /// Blob goes first; if that fails the record is kept so the blob can
    /// still be reached for a retry.
    pub async fn delete_record(
        db: &Database,
        provider: &dyn StorageProvider,
        id: &str,
    ) -> Result<FileRecord> {
        let record = Self::get_record(db, id).await?;

        provider.delete(&record.filename).await?;

        sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(db.pool())
            .await?;

        Ok(record)
    }
}

fn string_field(field: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(s),
        _ => Err(AppError::BadRequest(format!(
            "Field '{}' must be a non-empty string",
            field
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocalStorageConfig;
    use crate::storage::LocalStorage;
    use serde_json::json;
    use tempfile::TempDir;

    async fn setup() -> (Database, LocalStorage, TempDir) {
        let temp = TempDir::new().expect("tempdir");
        let db_path = temp.path().join("test.db");
        let db = Database::new(&db_path.to_string_lossy()).await.expect("db");
        db.run_migrations().await.expect("migrations");
        let storage = LocalStorage::new(LocalStorageConfig {
            base_path: temp.path().join("uploads").to_string_lossy().into_owned(),
        });
        (db, storage, temp)
    }

    #[test]
    fn storage_key_keeps_extension() {
        let key = FileService::storage_key("report.pdf");
        assert!(key.ends_with(".pdf"));
        // timestamp prefix up to the dash
        let prefix = key.split('-').next().unwrap();
        assert!(prefix.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn storage_key_without_extension() {
        let key = FileService::storage_key("Makefile");
        assert!(!key.contains('.'));
    }

    #[test]
    fn storage_keys_do_not_collide() {
        let a = FileService::storage_key("a.txt");
        let b = FileService::storage_key("a.txt");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn store_upload_writes_blob_and_record() {
        let (db, storage, _temp) = setup().await;

        let record = FileService::store_upload(
            &db,
            &storage,
            "a.txt",
            Some("text/plain".to_string()),
            Bytes::from_static(b"hello"),
        )
        .await
        .expect("upload");

        assert!(record.filename.ends_with(".txt"));
        assert_eq!(record.size, 5);
        assert_eq!(record.content_type.as_deref(), Some("text/plain"));
        assert_eq!(record.locator, storage.locator(&record.filename));
        assert!(storage.exists(&record.filename).await.unwrap());

        let listed = FileService::list_records(&db).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, record.id);
    }

    #[tokio::test]
    async fn store_upload_rejects_path_separators() {
        let (db, storage, _temp) = setup().await;

        let err = FileService::store_upload(&db, &storage, "../evil.sh", None, Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(FileService::list_records(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_merges_arbitrary_fields() {
        let (db, storage, _temp) = setup().await;
        let record =
            FileService::store_upload(&db, &storage, "a.txt", None, Bytes::from_static(b"hi"))
                .await
                .unwrap();

        let updated = FileService::update_record(
            &db,
            &record.id,
            json!({"label": "invoice", "year": 2024}),
        )
        .await
        .unwrap();

        // Typed columns untouched
        assert_eq!(updated.filename, record.filename);
        assert_eq!(updated.locator, record.locator);
        assert_eq!(updated.size, record.size);

        let attrs: Map<String, Value> = serde_json::from_str(&updated.attrs).unwrap();
        assert_eq!(attrs.get("label"), Some(&json!("invoice")));
        assert_eq!(attrs.get("year"), Some(&json!(2024)));
    }

    #[tokio::test]
    async fn update_changes_typed_columns_and_ignores_id() {
        let (db, storage, _temp) = setup().await;
        let record =
            FileService::store_upload(&db, &storage, "a.txt", None, Bytes::from_static(b"hi"))
                .await
                .unwrap();

        let updated = FileService::update_record(
            &db,
            &record.id,
            json!({"filename": "renamed.txt", "id": "hijack"}),
        )
        .await
        .unwrap();

        assert_eq!(updated.filename, "renamed.txt");
        assert_eq!(updated.id, record.id);
    }

    #[tokio::test]
    async fn update_rejects_non_object_body_and_bad_types() {
        let (db, storage, _temp) = setup().await;
        let record =
            FileService::store_upload(&db, &storage, "a.txt", None, Bytes::from_static(b"hi"))
                .await
                .unwrap();

        let err = FileService::update_record(&db, &record.id, json!([1, 2]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = FileService::update_record(&db, &record.id, json!({"filename": 7}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let (db, _storage, _temp) = setup().await;
        let err = FileService::update_record(&db, "missing", json!({"a": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_record_and_blob() {
        let (db, storage, _temp) = setup().await;
        let record =
            FileService::store_upload(&db, &storage, "a.txt", None, Bytes::from_static(b"bye"))
                .await
                .unwrap();

        let deleted = FileService::delete_record(&db, &storage, &record.id)
            .await
            .unwrap();
        assert_eq!(deleted.id, record.id);

        assert!(!storage.exists(&record.filename).await.unwrap());
        let err = FileService::get_record(&db, &record.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_unknown_id_is_not_found() {
        let (db, storage, _temp) = setup().await;
        let err = FileService::delete_record(&db, &storage, "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn find_by_filename_round_trips() {
        let (db, storage, _temp) = setup().await;
        let record =
            FileService::store_upload(&db, &storage, "a.txt", None, Bytes::from_static(b"x"))
                .await
                .unwrap();

        let found = FileService::find_by_filename(&db, &record.filename)
            .await
            .unwrap();
        assert_eq!(found.map(|r| r.id), Some(record.id));

        let missing = FileService::find_by_filename(&db, "nope.bin").await.unwrap();
        assert!(missing.is_none());
    }
}
