//! Gallery endpoints.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
};

use super::{ApiResponse, ApiResult};
use crate::errors::AppError;
use crate::models::{GalleryPhoto, PhotoUpload};
use crate::AppState;

/// GET /api/gallery - List all photos, newest first.
pub async fn list_photos(State(state): State<AppState>) -> ApiResult<Vec<GalleryPhoto>> {
    Ok(ApiResponse::ok(state.gallery.list().await?))
}

/// POST /api/gallery/upload - Multipart upload with `file` and `personName` fields.
pub async fn upload_photo(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<GalleryPhoto> {
    let mut person_name = String::new();
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "personName" => {
                person_name = field.text().await.map_err(multipart_error)?;
            }
            "file" => {
                let filename = field.file_name().unwrap_or("photo").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                upload = Some(PhotoUpload {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            other => tracing::debug!(field = other, "Ignoring unknown upload field"),
        }
    }

    let upload = upload.ok_or_else(|| AppError::Validation("File is required".to_string()))?;
    let photo = state.gallery.upload(&person_name, upload).await?;
    Ok(ApiResponse::created(photo))
}

/// POST /api/gallery/:id/thanksgiving-ify - Generate the themed variant once.
pub async fn thanksgivingify_photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<GalleryPhoto> {
    Ok(ApiResponse::ok(state.gallery.thanksgivingify(&id).await?))
}

/// DELETE /api/gallery/:id - Delete a photo record.
pub async fn delete_photo(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.gallery.delete(&id).await?;
    Ok(ApiResponse::ok(()))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Upload exceeds the size limit".to_string())
    } else {
        AppError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}
