use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::UserRole;
use crate::services::Claims;
use crate::web::AppState;
use crate::web::responses::data;

const MAX_LOGO_BYTES: usize = 5 * 1024 * 1024;
const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, Serialize)]
struct UploadLogoResponse {
    path: String,
    filename: String,
    url: String,
}

pub async fn upload_logo(
    State(state): State<AppState>,
    claims: Claims,
    mut multipart: Multipart,
) -> AppResult<Json<Value>> {
    claims.require(UserRole::Operator)?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::validation("malformed multipart body"))?
    {
        if field.name() == Some("logo") {
            let file_name = field
                .file_name()
                .ok_or_else(|| AppError::validation("logo file is required"))?
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|_| AppError::validation("failed to read logo upload"))?;
            upload = Some((file_name, bytes.to_vec()));
        }
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| AppError::validation("logo file is required"))?;

    let extension = std::path::Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::validation(
            "only PNG, JPG, JPEG, GIF or WebP files are supported",
        ));
    }

    if bytes.len() > MAX_LOGO_BYTES {
        return Err(AppError::validation("logo file exceeds the 5MB limit"));
    }

    let filename = format!("{}_{}.{extension}", Uuid::new_v4(), Utc::now().timestamp());
    let target = state.storage.logo_path.join(&filename);

    tokio::fs::create_dir_all(&state.storage.logo_path)
        .await
        .map_err(|e| AppError::internal(format!("failed to prepare logo directory: {e}")))?;
    tokio::fs::write(&target, &bytes)
        .await
        .map_err(|e| AppError::internal(format!("failed to store logo: {e}")))?;

    info!(filename = %filename, size = bytes.len(), "stored uploaded logo");

    Ok(data(UploadLogoResponse {
        path: filename.clone(),
        url: format!("/logos/{filename}"),
        filename,
    }))
}

pub async fn delete_logo(
    State(state): State<AppState>,
    claims: Claims,
    Path(filename): Path<String>,
) -> AppResult<StatusCode> {
    claims.require(UserRole::Operator)?;

    if filename.is_empty() {
        return Err(AppError::validation("filename is required"));
    }
    // Keep deletions inside the logo directory
    if filename.contains("..") || filename.contains('/') {
        return Err(AppError::validation("invalid filename"));
    }

    let target = state.storage.logo_path.join(&filename);
    match tokio::fs::remove_file(&target).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AppError::not_found("logo", filename))
        }
        Err(e) => Err(AppError::internal(format!("failed to delete logo: {e}"))),
    }
}
