//! Document upload endpoints.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::http::auth::AuthUser;
use crate::http::error::ApiError;
use crate::http::server::AppState;

/// Accepted document types.
const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "csv", "xlsx", "docx", "txt", "md"];

/// 10 MB per file.
const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Serialize)]
pub struct UploadedFile {
    pub filename: String,
    pub original_name: String,
    pub size_bytes: usize,
}

#[derive(Serialize)]
pub struct StoredFile {
    pub filename: String,
    pub size_bytes: u64,
    pub uploaded_at: String,
}

fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
}

/// POST /api/uploads - multipart form with one or more files
async fn upload(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<UploadedFile>>), ApiError> {
    let mut stored = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("invalid multipart body: {e}")))?
    {
        let original_name = match field.file_name() {
            Some(name) => name.to_string(),
            None => continue,
        };

        let extension = extension_of(&original_name)
            .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| {
                ApiError::validation(format!(
                    "unsupported file type: {original_name} (allowed: {})",
                    ALLOWED_EXTENSIONS.join(", ")
                ))
            })?;

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("reading upload failed: {e}")))?;
        if data.len() > MAX_FILE_BYTES {
            return Err(ApiError::validation("file exceeds the 10 MB limit"));
        }

        // Server-generated name; the original is only echoed back.
        let filename = format!("upload_{}.{extension}", Uuid::new_v4());
        tokio::fs::create_dir_all(&state.settings.uploads_dir)
            .await
            .map_err(|e| ApiError::internal(format!("creating uploads dir failed: {e}")))?;
        tokio::fs::write(state.settings.uploads_dir.join(&filename), &data)
            .await
            .map_err(|e| ApiError::internal(format!("storing upload failed: {e}")))?;

        stored.push(UploadedFile {
            filename,
            original_name,
            size_bytes: data.len(),
        });
    }

    if stored.is_empty() {
        return Err(ApiError::validation("no files in upload"));
    }
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /api/uploads
async fn list(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<Json<Vec<StoredFile>>, ApiError> {
    let mut files = Vec::new();
    let mut entries = match tokio::fs::read_dir(&state.settings.uploads_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Json(files)),
        Err(e) => return Err(ApiError::internal(format!("listing uploads failed: {e}"))),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ApiError::internal(format!("listing uploads failed: {e}")))?
    {
        let meta = entry
            .metadata()
            .await
            .map_err(|e| ApiError::internal(format!("listing uploads failed: {e}")))?;
        let uploaded = meta
            .modified()
            .map(chrono::DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        files.push(StoredFile {
            filename: entry.file_name().to_string_lossy().to_string(),
            size_bytes: meta.len(),
            uploaded_at: uploaded.to_rfc3339(),
        });
    }

    files.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
    Ok(Json(files))
}

/// Upload routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/uploads", post(upload).get(list))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_whitelist() {
        assert_eq!(extension_of("report.PDF").as_deref(), Some("pdf"));
        assert_eq!(extension_of("noext"), None);
        assert!(ALLOWED_EXTENSIONS.contains(&"xlsx"));
        assert!(!ALLOWED_EXTENSIONS.contains(&"exe"));
    }
}
