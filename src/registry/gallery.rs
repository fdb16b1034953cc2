//! Gallery operations: upload validation, blob storage and the themed transform.

use std::sync::Arc;

use crate::blob::{validate_upload, BlobStore};
use crate::db::Store;
use crate::errors::AppError;
use crate::images::ImageService;
use crate::models::{required, GalleryPhoto, PhotoUpload};

/// Photo uploads and their themed variants.
pub struct GalleryRegistry {
    store: Arc<dyn Store>,
    images: ImageService,
    blobs: Arc<dyn BlobStore>,
    max_upload_bytes: usize,
}

impl GalleryRegistry {
    pub fn new(
        store: Arc<dyn Store>,
        images: ImageService,
        blobs: Arc<dyn BlobStore>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            store,
            images,
            blobs,
            max_upload_bytes,
        }
    }

    /// All photos, newest first.
    pub async fn list(&self) -> Result<Vec<GalleryPhoto>, AppError> {
        self.store.list_photos().await
    }

    /// Validate, store the file, then record the photo.
    pub async fn upload(
        &self,
        person_name: &str,
        upload: PhotoUpload,
    ) -> Result<GalleryPhoto, AppError> {
        let person = required("Person name", person_name)?;
        validate_upload(&upload.content_type, upload.bytes.len(), self.max_upload_bytes)?;

        let size = upload.bytes.len();
        let url = self
            .blobs
            .store(upload.bytes, &upload.filename, &upload.content_type)
            .await?;

        let photo = GalleryPhoto::new(&person, url);
        self.store.insert_photo(&photo).await?;

        tracing::info!(photo_id = %photo.id, person = %person, size, "Photo uploaded");
        Ok(photo)
    }

    /// Attach the themed variant. Each photo is transformed at most once.
    pub async fn thanksgivingify(&self, id: &str) -> Result<GalleryPhoto, AppError> {
        let photo = self
            .store
            .get_photo(id)
            .await?
            .ok_or_else(|| AppError::photo_not_found(id))?;

        if photo.is_themed() {
            return Err(AppError::Conflict(
                "Photo is already Thanksgiving-ified".to_string(),
            ));
        }

        let themed_url = self.images.themed_photo(&photo.original_photo_url).await;
        let photo = self.store.set_themed_photo(id, &themed_url).await?;

        tracing::info!(photo_id = %id, "Photo Thanksgiving-ified");
        Ok(photo)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.store.delete_photo(id).await?;
        tracing::info!(photo_id = %id, "Photo deleted");
        Ok(())
    }
}
