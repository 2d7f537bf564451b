use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::FromRow;

/// File record model
///
/// `attrs` is a JSON object kept as text; the update operation merges
/// arbitrary client fields into it.
#[derive(Debug, Clone, FromRow)]
pub struct FileRecord {
    pub id: String,
    pub filename: String,
    pub locator: String,
    pub content_type: Option<String>,
    pub size: i64,
    pub attrs: String,
    pub created_at: String,
    pub updated_at: String,
}

/// File record wire shape
///
/// The locator is serialized as `url` when it points at a remote object and
/// as `path` when it is a server-local file, so clients see the same field
/// names regardless of backend.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecordResponse {
    pub id: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub size: i64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

impl From<FileRecord> for FileRecordResponse {
    fn from(record: FileRecord) -> Self {
        let attrs: Map<String, Value> = serde_json::from_str(&record.attrs).unwrap_or_default();

        let is_url = record.locator.starts_with("http://") || record.locator.starts_with("https://");
        let (url, path) = if is_url {
            (Some(record.locator), None)
        } else {
            (None, Some(record.locator))
        };

        Self {
            id: record.id,
            filename: record.filename,
            url,
            path,
            content_type: record.content_type,
            size: record.size,
            created_at: record.created_at,
            updated_at: record.updated_at,
            attrs,
        }
    }
}
