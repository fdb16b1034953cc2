//! Blob storage for gallery uploads.
//!
//! Unlike image generation there is no fallback here: a failed store fails the upload.

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::AppError;
use crate::images::to_data_url;

const VERCEL_BLOB_API: &str = "https://blob.vercel-storage.com";

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("blob API returned {status}: {body}")]
    Api { status: u16, body: String },
}

impl From<BlobError> for AppError {
    fn from(err: BlobError) -> Self {
        tracing::error!("Blob storage error: {}", err);
        AppError::Upstream(format!("Photo storage unavailable: {}", err))
    }
}

/// Stores raw bytes and hands back a public URL.
#[async_trait]
pub trait BlobStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn store(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, BlobError>;
}

/// Keeps uploads inline as base64 data URLs. Used when no blob token is configured.
pub struct InlineBlobStore;

#[async_trait]
impl BlobStore for InlineBlobStore {
    fn name(&self) -> &'static str {
        "inline"
    }

    async fn store(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, BlobError> {
        tracing::debug!(filename, size = bytes.len(), "Storing upload inline");
        Ok(to_data_url(content_type, &bytes))
    }
}

/// Public blob storage behind the Vercel Blob HTTP API.
pub struct VercelBlobStore {
    http_client: reqwest::Client,
    token: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PutBlobResponse {
    url: String,
}

impl VercelBlobStore {
    pub fn new(token: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            token,
            base_url: VERCEL_BLOB_API.to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for VercelBlobStore {
    fn name(&self) -> &'static str {
        "vercel"
    }

    async fn store(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, BlobError> {
        let url = format!("{}/{}", self.base_url, urlencoding::encode(filename));

        let response = self
            .http_client
            .put(&url)
            .bearer_auth(&self.token)
            .header("x-content-type", content_type)
            .header("x-add-random-suffix", "1")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BlobError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let blob: PutBlobResponse = response.json().await?;
        Ok(blob.url)
    }
}

/// Reject uploads that are not images or exceed `max_bytes`, before any storage call.
pub fn validate_upload(content_type: &str, size: usize, max_bytes: usize) -> Result<(), AppError> {
    if !content_type.starts_with("image/") {
        return Err(AppError::Validation(format!(
            "Only image uploads are accepted (got {})",
            content_type
        )));
    }
    if size == 0 {
        return Err(AppError::Validation("File is empty".to_string()));
    }
    if size > max_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "File is {} bytes, the limit is {} bytes",
            size, max_bytes
        )));
    }
    Ok(())
}
