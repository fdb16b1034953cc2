use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{parse_data_url, ImageError, ImageGenerator, THEME_PROMPT};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MODEL: &str = "gemini-2.5-flash-image";

pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key,
            endpoint: format!("{}/{}:generateContent", GEMINI_API_BASE, MODEL),
        }
    }

    async fn generate_content(&self, parts: Vec<Part>) -> Result<String, ImageError> {
        let request = GenerateContentRequest::new(parts);

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Gemini error: {} - {}", status, body);
            return Err(ImageError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: GenerateContentResponse = response.json().await?;
        completion.first_image().ok_or(ImageError::NoImage)
    }

    /// Resolve an image reference into inline data the API accepts.
    async fn inline_source(&self, image_ref: &str) -> Result<InlineData, ImageError> {
        if let Some((mime_type, data)) = parse_data_url(image_ref) {
            return Ok(InlineData {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            });
        }

        if !(image_ref.starts_with("https://") || image_ref.starts_with("http://")) {
            return Err(ImageError::UnsupportedSource(image_ref.to_string()));
        }

        let response = self
            .http_client
            .get(image_ref)
            .send()
            .await?
            .error_for_status()?;
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = response.bytes().await?;

        Ok(InlineData {
            mime_type,
            data: STANDARD.encode(&bytes),
        })
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ImageError> {
        self.generate_content(vec![Part::text(prompt)]).await
    }

    async fn transform(&self, image_ref: &str) -> Result<String, ImageError> {
        let source = self.inline_source(image_ref).await?;
        self.generate_content(vec![Part::text(THEME_PROMPT), Part::image(source)])
            .await
    }
}

// Wire types for the generateContent endpoint

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    fn new(parts: Vec<Part>) -> Self {
        Self {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE".to_string()],
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn image(data: InlineData) -> Self {
        Self {
            inline_data: Some(data),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default = "default_mime_type")]
    mime_type: String,
    data: String,
}

fn default_mime_type() -> String {
    "image/png".to_string()
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateContentResponse {
    /// First inline image of the first candidate, as a data URL.
    fn first_image(&self) -> Option<String> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|part| part.inline_data.as_ref())
            .map(|img| format!("data:{};base64,{}", img.mime_type, img.data))
    }
}
