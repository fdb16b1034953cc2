//! Friendsgiving Backend
//!
//! REST backend for the potluck dish list and photo gallery, with SQLite persistence
//! and AI-generated dish images.

mod api;
mod auth;
mod badges;
mod blob;
mod config;
mod db;
mod errors;
mod images;
mod models;
mod registry;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use blob::{BlobStore, InlineBlobStore, VercelBlobStore};
use config::{Config, StorageBackend};
use db::{MemoryStore, SqliteStore, Store};
use images::{GeminiClient, ImageGenerator, ImageService, PlaceholderImages};
use registry::{DishRegistry, GalleryRegistry};

/// Room for multipart boundaries and the text fields on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub dishes: Arc<DishRegistry>,
    pub gallery: Arc<GalleryRegistry>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        images: ImageService,
        blobs: Arc<dyn BlobStore>,
        config: Config,
    ) -> Self {
        let dishes = DishRegistry::new(store.clone(), images.clone());
        let gallery = GalleryRegistry::new(store, images, blobs, config.max_upload_bytes);
        Self {
            dishes: Arc::new(dishes),
            gallery: Arc::new(gallery),
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let subscriber = tracing_subscriber::registry().with(env_filter);
    if config.log_json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Friendsgiving Backend");
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.admin_psk.is_none() {
        tracing::warn!(
            "No admin PSK configured (FRIENDSGIVING_ADMIN_PSK). Admin routes are unprotected!"
        );
    }

    let bind_addr = config.bind_addr;
    let state = build_state(config).await?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Wire the configured backends together.
async fn build_state(config: Config) -> Result<AppState, Box<dyn std::error::Error>> {
    let store: Arc<dyn Store> = match config.storage {
        StorageBackend::Sqlite => {
            tracing::info!("Database path: {:?}", config.db_path);
            let pool = db::init_database(&config.db_path).await?;
            Arc::new(SqliteStore::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let generator: Arc<dyn ImageGenerator> = match &config.image_api_key {
        Some(key) => Arc::new(GeminiClient::new(key.clone())),
        None => {
            tracing::warn!("GOOGLE_AI_API_KEY not set; dishes get placeholder images");
            Arc::new(PlaceholderImages)
        }
    };
    let images = ImageService::new(generator, config.image_timeout);

    let blobs: Arc<dyn BlobStore> = match &config.blob_token {
        Some(token) => Arc::new(VercelBlobStore::new(token.clone())),
        None => {
            tracing::warn!("BLOB_READ_WRITE_TOKEN not set; uploads are stored inline");
            Arc::new(InlineBlobStore)
        }
    };

    tracing::info!(
        store = store.backend_tag(),
        images = images.generator_name(),
        blobs = blobs.name(),
        "Backends ready"
    );

    Ok(AppState::new(store, images, blobs, config))
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.admin_psk.clone();
    let upload_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    let admin_routes = Router::new()
        .route("/dishes", post(api::create_dish))
        .route("/dishes/{id}", put(api::update_dish))
        .route("/dishes/{id}", delete(api::delete_dish))
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    let upload_routes = Router::new()
        .route("/gallery/upload", post(api::upload_photo))
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(upload_limit)),
        );

    let api_routes = Router::new()
        // Dishes
        .route("/dishes", get(api::list_dishes))
        .route("/dishes/{id}", get(api::get_dish))
        .route("/dishes/{id}/badges", get(api::get_dish_badges))
        .route("/dishes/{id}/claim", post(api::claim_dish))
        .route("/dishes/{id}/react", post(api::react_to_dish))
        // Gallery
        .route("/gallery", get(api::list_photos))
        .route("/gallery/{id}/thanksgiving-ify", post(api::thanksgivingify_photo))
        .route("/gallery/{id}", delete(api::delete_photo))
        .merge(upload_routes)
        .nest("/admin", admin_routes);

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
