use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::FileRecordResponse;
use crate::services::FileService;
use crate::AppState;

/// Greeting
/// GET /
pub async fn greeting() -> &'static str {
    "Hello, filedrop!"
}

/// Upload a file
/// POST /upload
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut file_data: Option<Bytes> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;

    // Only the `file` field carries payload; anything else is ignored
    while let Some(field) = multipart.next_field().await.map_err(map_multipart_err)? {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            file_name = field.file_name().map(|s| s.to_string());
            content_type = field.content_type().map(|s| s.to_string());
            file_data = Some(field.bytes().await.map_err(map_multipart_err)?);
        }
    }

    let data = file_data.ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;
    let original_name =
        file_name.ok_or_else(|| AppError::BadRequest("No file name provided".to_string()))?;

    let record = FileService::store_upload(
        &state.db,
        state.storage.as_ref(),
        &original_name,
        content_type,
        data,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(FileRecordResponse::from(record))))
}

/// List all file records
/// GET /files
pub async fn list_files(State(state): State<AppState>) -> Result<Json<Vec<FileRecordResponse>>> {
    let records = FileService::list_records(&state.db).await?;
    Ok(Json(
        records.into_iter().map(FileRecordResponse::from).collect(),
    ))
}

/// Download a stored file by its blob name
/// GET /download/:filename
pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return Err(AppError::BadRequest("Invalid file name".to_string()));
    }

    let record = FileService::find_by_filename(&state.db, &filename)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    let data = state.storage.get(&record.filename).await?;

    let fallback_name = record.filename.replace(['"', '\\'], "_");
    let encoded_name = urlencoding::encode(&record.filename);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, data.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"; filename*=UTF-8''{}",
                fallback_name, encoded_name
            ),
        )
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

/// Merge a partial update into a record
/// PUT /update/:id
pub async fn update_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> Result<Json<FileRecordResponse>> {
    let record = FileService::update_record(&state.db, &id, patch).await?;
    Ok(Json(FileRecordResponse::from(record)))
}

/// Delete a record and its blob
/// DELETE /delete/:id
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FileRecordResponse>> {
    let record = FileService::delete_record(&state.db, state.storage.as_ref(), &id).await?;
    Ok(Json(FileRecordResponse::from(record)))
}

fn map_multipart_err(e: axum::extract::multipart::MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("File exceeds the 5 MiB limit".to_string())
    } else {
        AppError::BadRequest(format!("Failed to process multipart: {}", e))
    }
}
