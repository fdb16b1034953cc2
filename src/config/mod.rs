//! Configuration module for the Friendsgiving backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default cap for gallery uploads (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Which storage backend holds dishes and gallery photos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// SQLite file on disk
    Sqlite,
    /// Process-local maps, lost on restart
    Memory,
}

impl StorageBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Some(StorageBackend::Sqlite),
            "memory" => Some(StorageBackend::Memory),
            _ => None,
        }
    }
}

/// Configuration error raised for malformed environment values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Storage backend for dishes and photos
    pub storage: StorageBackend,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Pre-shared key guarding the admin routes
    pub admin_psk: Option<String>,
    /// Google Generative Language API key; placeholders are used without one
    pub image_api_key: Option<String>,
    /// Upper bound for a single image generation call
    pub image_timeout: Duration,
    /// Blob storage token; uploads are inlined as data URLs without one
    pub blob_token: Option<String>,
    /// Largest accepted gallery upload in bytes
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let bind_addr = parse_var("FRIENDSGIVING_BIND_ADDR", "127.0.0.1:8080")?;
        let log_level =
            env::var("FRIENDSGIVING_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_json = parse_var("FRIENDSGIVING_LOG_JSON", "false")?;

        let storage_raw =
            env::var("FRIENDSGIVING_STORAGE").unwrap_or_else(|_| "sqlite".to_string());
        let storage = StorageBackend::parse(&storage_raw).ok_or(ConfigError::Invalid {
            var: "FRIENDSGIVING_STORAGE",
            value: storage_raw.clone(),
        })?;

        let db_path = env::var("FRIENDSGIVING_DB_PATH")
            .unwrap_or_else(|_| "./data/friendsgiving.sqlite".to_string())
            .into();

        let admin_psk = non_empty_var("FRIENDSGIVING_ADMIN_PSK");
        let image_api_key = non_empty_var("GOOGLE_AI_API_KEY");
        let image_timeout_secs: u64 = parse_var("FRIENDSGIVING_IMAGE_TIMEOUT_SECS", "60")?;
        let blob_token = non_empty_var("BLOB_READ_WRITE_TOKEN");
        let max_upload_bytes = parse_var(
            "FRIENDSGIVING_MAX_UPLOAD_BYTES",
            &DEFAULT_MAX_UPLOAD_BYTES.to_string(),
        )?;

        Ok(Self {
            bind_addr,
            log_level,
            log_json,
            storage,
            db_path,
            admin_psk,
            image_api_key,
            image_timeout: Duration::from_secs(image_timeout_secs),
            blob_token,
            max_upload_bytes,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { var: name, value: raw })
}
