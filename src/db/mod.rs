//! Storage module.
//!
//! Dishes and gallery photos live behind the [`Store`] trait. SQLite is the
//! persistent backend; the in-memory backend serves local development.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::errors::AppError;
use crate::models::{Dish, DishChange, GalleryPhoto};

/// Persistence for the `dishes` and `galleryPhotos` collections.
///
/// Returned values are snapshots. `claim_dish`, `add_reaction`, `update_dish`
/// and `set_themed_photo` are atomic per record.
#[async_trait]
pub trait Store: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    /// All dishes, newest first.
    async fn list_dishes(&self) -> Result<Vec<Dish>, AppError>;
    async fn get_dish(&self, id: &str) -> Result<Option<Dish>, AppError>;
    async fn insert_dish(&self, dish: &Dish) -> Result<(), AppError>;
    /// Apply `changes` in order; all or nothing.
    async fn update_dish(&self, id: &str, changes: &[DishChange]) -> Result<Dish, AppError>;
    async fn delete_dish(&self, id: &str) -> Result<(), AppError>;
    /// Set the owner if and only if the dish is unclaimed.
    async fn claim_dish(&self, id: &str, person_name: &str) -> Result<Dish, AppError>;
    /// Increment `reactions[emoji]`, creating it at 1.
    async fn add_reaction(&self, id: &str, emoji: &str) -> Result<Dish, AppError>;

    /// All photos, newest first.
    async fn list_photos(&self) -> Result<Vec<GalleryPhoto>, AppError>;
    async fn get_photo(&self, id: &str) -> Result<Option<GalleryPhoto>, AppError>;
    async fn insert_photo(&self, photo: &GalleryPhoto) -> Result<(), AppError>;
    /// Set the themed variant if and only if none is set yet.
    async fn set_themed_photo(&self, id: &str, url: &str) -> Result<GalleryPhoto, AppError>;
    async fn delete_photo(&self, id: &str) -> Result<(), AppError>;
}

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dishes (
            id TEXT PRIMARY KEY,
            dish_name TEXT NOT NULL,
            dietary_tags TEXT NOT NULL DEFAULT '[]',
            image_url TEXT NOT NULL,
            claimed_by TEXT,
            created_at INTEGER NOT NULL,
            year INTEGER NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dish_reactions (
            dish_id TEXT NOT NULL REFERENCES dishes(id) ON DELETE CASCADE,
            emoji TEXT NOT NULL,
            count INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (dish_id, emoji)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS gallery_photos (
            id TEXT PRIMARY KEY,
            person_name TEXT NOT NULL,
            original_photo_url TEXT NOT NULL,
            thanksgiving_photo_url TEXT,
            created_at INTEGER NOT NULL,
            year INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for list ordering
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_dishes_created_at ON dishes(created_at);
        CREATE INDEX IF NOT EXISTS idx_gallery_photos_created_at ON gallery_photos(created_at);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
