//! AI image generation with placeholder fallback.
//!
//! Callers go through [`ImageService`], which bounds every upstream call by a
//! timeout and substitutes a fallback reference on any failure. Image
//! generation never fails a dish or gallery operation.

mod gemini;

pub use gemini::GeminiClient;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image generation is not configured")]
    NotConfigured,

    #[error("image request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("response contained no image data")]
    NoImage,

    #[error("unsupported image source: {0}")]
    UnsupportedSource(String),
}

/// External generative-image service.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Render a new image from a text prompt.
    async fn generate(&self, prompt: &str) -> Result<String, ImageError>;

    /// Produce a themed variant of an existing image.
    async fn transform(&self, image_ref: &str) -> Result<String, ImageError>;
}

/// Generator used when no API key is configured; every call defers to the fallback.
pub struct PlaceholderImages;

#[async_trait]
impl ImageGenerator for PlaceholderImages {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, ImageError> {
        Err(ImageError::NotConfigured)
    }

    async fn transform(&self, _image_ref: &str) -> Result<String, ImageError> {
        Err(ImageError::NotConfigured)
    }
}

pub fn dish_prompt(dish_name: &str) -> String {
    format!(
        "A beautiful, appetizing photo of {} on a festive table setting, professional food photography, warm lighting",
        dish_name
    )
}

pub const THEME_PROMPT: &str = "Transform this image into a festive Thanksgiving scene. Add autumn leaves, warm fall colors (oranges, reds, yellows), pumpkins, turkeys, and a cozy holiday atmosphere while keeping the people recognizable.";

/// Deterministic placeholder for a dish.
pub fn placeholder_url(dish_name: &str) -> String {
    format!(
        "https://placehold.co/600x400/FF7518/FFF8E7/png?text={}&font=roboto",
        urlencoding::encode(dish_name)
    )
}

pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// Split a base64 data URL into its mime type and payload.
pub fn parse_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime_type = meta.strip_suffix(";base64")?;
    Some((mime_type, payload))
}

/// Timeout and fallback policy around an [`ImageGenerator`].
#[derive(Clone)]
pub struct ImageService {
    generator: Arc<dyn ImageGenerator>,
    timeout: Duration,
}

impl ImageService {
    pub fn new(generator: Arc<dyn ImageGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    pub fn generator_name(&self) -> &'static str {
        self.generator.name()
    }

    /// Image for a dish; the placeholder when generation fails or times out.
    pub async fn dish_image(&self, dish_name: &str) -> String {
        let prompt = dish_prompt(dish_name);
        match tokio::time::timeout(self.timeout, self.generator.generate(&prompt)).await {
            Ok(Ok(url)) => url,
            Ok(Err(ImageError::NotConfigured)) => {
                tracing::debug!(dish = dish_name, "Image generation disabled, using placeholder");
                placeholder_url(dish_name)
            }
            Ok(Err(e)) => {
                tracing::warn!(dish = dish_name, "Image generation failed, using placeholder: {}", e);
                placeholder_url(dish_name)
            }
            Err(_) => {
                tracing::warn!(
                    dish = dish_name,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Image generation timed out, using placeholder"
                );
                placeholder_url(dish_name)
            }
        }
    }

    /// Themed variant of a photo; the original when the transform fails or times out.
    pub async fn themed_photo(&self, original_url: &str) -> String {
        match tokio::time::timeout(self.timeout, self.generator.transform(original_url)).await {
            Ok(Ok(url)) => url,
            Ok(Err(ImageError::NotConfigured)) => {
                tracing::debug!("Image transform disabled, keeping original photo");
                original_url.to_string()
            }
            Ok(Err(e)) => {
                tracing::warn!("Image transform failed, keeping original photo: {}", e);
                original_url.to_string()
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Image transform timed out, keeping original photo"
                );
                original_url.to_string()
            }
        }
    }
}
