//! Gallery photo model matching the frontend GalleryPhoto interface.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::new_id;

/// An uploaded photo, optionally paired with its themed variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GalleryPhoto {
    pub id: String,
    pub person_name: String,
    pub original_photo_url: String,
    pub thanksgiving_photo_url: Option<String>,
    /// Epoch milliseconds
    pub created_at: i64,
    pub year: i32,
}

impl GalleryPhoto {
    pub fn new(person_name: &str, original_photo_url: String) -> Self {
        let now = Utc::now();
        Self {
            id: new_id("photo"),
            person_name: person_name.trim().to_string(),
            original_photo_url,
            thanksgiving_photo_url: None,
            created_at: now.timestamp_millis(),
            year: now.year(),
        }
    }

    pub fn is_themed(&self) -> bool {
        self.thanksgiving_photo_url.is_some()
    }
}

/// A gallery file as received from the client.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}
