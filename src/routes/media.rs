use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use uuid::Uuid;

use crate::access::{Action, Resource};
use crate::routes::{authorize, ApiError, ListResponse, SuccessResponse};
use crate::state::AppState;
use crate::store::models::MediaItem;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "pdf"];

/// Metadata keys a PATCH may change. The stored file itself is immutable.
const EDITABLE_FIELDS: &[&str] = &["alt", "caption"];

fn detect_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: 52 49 46 46 ... 57 45 42 50
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        // PDF: 25 50 44 46
        [0x25, 0x50, 0x44, 0x46, ..] => Some("application/pdf"),
        _ => None,
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

/// Rejects path traversal and separators.
fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains("..")
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains('\0')
}

fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext.to_lowercase())
}

struct Upload {
    original_name: String,
    bytes: axum::body::Bytes,
}

/// GET /api/admin/media
pub async fn list_media(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ListResponse<MediaItem>>, ApiError> {
    authorize(&state, &headers, Resource::Media, Action::Read)?;

    let mut items = state.store.media.list().await?;
    items.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
    Ok(Json(items.into()))
}

/// GET /api/admin/media/{id}
pub async fn get_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<MediaItem>, ApiError> {
    authorize(&state, &headers, Resource::Media, Action::Read)?;
    state
        .store
        .media
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// POST /api/admin/media
/// Multipart fields: `file` (required), `alt`, `caption`.
pub async fn upload_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, Resource::Media, Action::Write)?;

    let mut upload = None;
    let mut metadata = Map::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "multipart error");
                return Err(ApiError::BadRequest("Invalid multipart data".to_string()));
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let original_name = field.file_name().unwrap_or("unknown").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    tracing::warn!(error = %e, "failed to read upload bytes");
                    ApiError::BadRequest("Failed to read file data".to_string())
                })?;
                upload = Some(Upload {
                    original_name,
                    bytes,
                });
            }
            "alt" | "caption" => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| ApiError::BadRequest(format!("Invalid {} field", name)))?;
                if !text.trim().is_empty() {
                    metadata.insert(name.clone(), Value::String(text.trim().to_string()));
                }
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;

    let ext = extension_of(&upload.original_name).unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::BadRequest(
            "Unsupported file type. Allowed: JPEG, PNG, WebP, GIF, PDF.".to_string(),
        ));
    }
    if upload.bytes.is_empty() {
        return Err(ApiError::BadRequest("Empty file".to_string()));
    }
    if upload.bytes.len() > state.config.max_upload_bytes {
        return Err(ApiError::BadRequest(format!(
            "File too large. Maximum size is {} bytes.",
            state.config.max_upload_bytes
        )));
    }
    let mime_type = detect_mime(&upload.bytes).ok_or_else(|| {
        ApiError::BadRequest("File content does not match an allowed type.".to_string())
    })?;

    let upload_path = PathBuf::from(&state.config.upload_dir);
    tokio::fs::create_dir_all(&upload_path)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to create upload directory: {}", e)))?;

    let filename = format!("{}.{}", Uuid::new_v4(), extension_for(mime_type));
    tokio::fs::write(upload_path.join(&filename), &upload.bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to write upload file: {}", e)))?;

    let url = format!(
        "{}/{}",
        state.config.upload_url_prefix.trim_end_matches('/'),
        filename
    );
    metadata.insert("filename".into(), json!(filename));
    metadata.insert("url".into(), json!(url));
    metadata.insert("type".into(), json!(mime_type));
    metadata.insert("size".into(), json!(upload.bytes.len()));

    let item = match state.store.media.create(metadata, None).await {
        Ok(item) => item,
        Err(e) => {
            // Keep the disk and the catalogue in step.
            let _ = tokio::fs::remove_file(upload_path.join(&filename)).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        filename = %item.filename,
        original = %upload.original_name,
        size = item.size,
        "media uploaded"
    );
    Ok((StatusCode::CREATED, Json(item)))
}

/// PATCH /api/admin/media/{id}
pub async fn update_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<Map<String, Value>>,
) -> Result<Json<MediaItem>, ApiError> {
    authorize(&state, &headers, Resource::Media, Action::Write)?;

    let payload = payload
        .into_iter()
        .filter(|(key, _)| EDITABLE_FIELDS.contains(&key.as_str()))
        .collect();
    Ok(Json(state.store.media.update(&id, payload, None).await?))
}

/// DELETE /api/admin/media/{id}
/// Removes the record and the stored file.
pub async fn delete_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    authorize(&state, &headers, Resource::Media, Action::Write)?;

    let item = state.store.media.get_by_id(&id).await?.ok_or(ApiError::NotFound)?;
    if !state.store.media.delete(&id).await? {
        return Err(ApiError::NotFound);
    }

    if is_safe_filename(&item.filename) {
        let file_path = PathBuf::from(&state.config.upload_dir).join(&item.filename);
        match tokio::fs::remove_file(&file_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(filename = %item.filename, "media file already missing");
            }
            Err(e) => {
                tracing::error!(filename = %item.filename, error = %e, "failed to delete media file");
            }
        }
    } else {
        tracing::warn!(filename = %item.filename, "refusing to delete unsafe media path");
    }

    tracing::info!(filename = %item.filename, "media deleted");
    Ok(Json(SuccessResponse { success: true }))
}
