//! SQLite-backed store.
//!
//! Per-record atomicity comes from conditional writes: claims only touch rows
//! whose `claimed_by` is still NULL, partial updates only touch rows whose
//! `version` matches what was read.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::Store;
use crate::errors::AppError;
use crate::models::{DietaryTag, Dish, DishChange, GalleryPhoto, MAX_REACTION_COUNT};

const DISH_COLUMNS: &str =
    "id, dish_name, dietary_tags, image_url, claimed_by, created_at, year, version";

const PHOTO_COLUMNS: &str =
    "id, person_name, original_photo_url, thanksgiving_photo_url, created_at, year";

/// Store for dishes and gallery photos in a SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write `updated` only if the stored row is still at `read_version`.
    async fn write_if_unchanged(
        &self,
        read_version: i64,
        updated: &Dish,
        reactions_changed: bool,
    ) -> Result<(), AppError> {
        let tags_json = serde_json::to_string(&updated.dietary_tags)?;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE dishes SET dish_name = ?, dietary_tags = ?, image_url = ?, claimed_by = ?, version = ? WHERE id = ? AND version = ?"
        )
        .bind(&updated.dish_name)
        .bind(&tags_json)
        .bind(&updated.image_url)
        .bind(&updated.claimed_by)
        .bind(updated.version)
        .bind(&updated.id)
        .bind(read_version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Dish {} was modified concurrently, retry the update",
                updated.id
            )));
        }

        if reactions_changed {
            sqlx::query("DELETE FROM dish_reactions WHERE dish_id = ?")
                .bind(&updated.id)
                .execute(&mut *tx)
                .await?;
            write_reactions(&mut tx, &updated.id, &updated.reactions).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn backend_tag(&self) -> &'static str {
        "sqlite"
    }

    // ==================== DISH OPERATIONS ====================

    async fn list_dishes(&self) -> Result<Vec<Dish>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM dishes ORDER BY created_at DESC, id DESC",
            DISH_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let reaction_rows = sqlx::query("SELECT dish_id, emoji, count FROM dish_reactions")
            .fetch_all(&self.pool)
            .await?;

        let mut reactions: HashMap<String, BTreeMap<String, u64>> = HashMap::new();
        for row in &reaction_rows {
            let dish_id: String = row.try_get("dish_id")?;
            let (emoji, count) = reaction_from_row(row)?;
            reactions.entry(dish_id).or_default().insert(emoji, count);
        }

        rows.iter()
            .map(|row| {
                let mut dish = dish_from_row(row)?;
                dish.reactions = reactions.remove(&dish.id).unwrap_or_default();
                Ok(dish)
            })
            .collect()
    }

    async fn get_dish(&self, id: &str) -> Result<Option<Dish>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_dish(&mut conn, id).await
    }

    async fn insert_dish(&self, dish: &Dish) -> Result<(), AppError> {
        let tags_json = serde_json::to_string(&dish.dietary_tags)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO dishes (id, dish_name, dietary_tags, image_url, claimed_by, created_at, year, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&dish.id)
        .bind(&dish.dish_name)
        .bind(&tags_json)
        .bind(&dish.image_url)
        .bind(&dish.claimed_by)
        .bind(dish.created_at)
        .bind(dish.year)
        .bind(dish.version)
        .execute(&mut *tx)
        .await?;

        write_reactions(&mut tx, &dish.id, &dish.reactions).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_dish(&self, id: &str, changes: &[DishChange]) -> Result<Dish, AppError> {
        let existing = self
            .get_dish(id)
            .await?
            .ok_or_else(|| AppError::dish_not_found(id))?;

        let mut updated = existing.clone();
        for change in changes {
            updated.apply(change)?;
        }
        updated.version = existing.version + 1;

        let reactions_changed = changes
            .iter()
            .any(|c| matches!(c, DishChange::SetReactions(_)));
        self.write_if_unchanged(existing.version, &updated, reactions_changed)
            .await?;
        Ok(updated)
    }

    async fn delete_dish(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM dish_reactions WHERE dish_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM dishes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::dish_not_found(id));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn claim_dish(&self, id: &str, person_name: &str) -> Result<Dish, AppError> {
        let result = sqlx::query(
            "UPDATE dishes SET claimed_by = ?, version = version + 1 WHERE id = ? AND claimed_by IS NULL",
        )
        .bind(person_name)
        .bind(id)
        .execute(&self.pool)
        .await?;

        let current = self.get_dish(id).await?;
        match current {
            None => Err(AppError::dish_not_found(id)),
            Some(dish) if result.rows_affected() == 0 => Err(AppError::already_claimed(
                dish.claimed_by.as_deref().unwrap_or_default(),
            )),
            Some(dish) => Ok(dish),
        }
    }

    async fn add_reaction(&self, id: &str, emoji: &str) -> Result<Dish, AppError> {
        let mut tx = self.pool.begin().await?;

        // Bumping the version takes the write lock and proves the dish exists.
        // A count already at the cap is left as is.
        let touched = sqlx::query("UPDATE dishes SET version = version + 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if touched.rows_affected() == 0 {
            return Err(AppError::dish_not_found(id));
        }

        sqlx::query(
            r#"INSERT INTO dish_reactions (dish_id, emoji, count) VALUES (?, ?, 1)
               ON CONFLICT(dish_id, emoji) DO UPDATE SET count = count + 1
               WHERE count < ?"#,
        )
        .bind(id)
        .bind(emoji)
        .bind(MAX_REACTION_COUNT as i64)
        .execute(&mut *tx)
        .await?;

        let dish = fetch_dish(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::dish_not_found(id))?;

        tx.commit().await?;
        Ok(dish)
    }

    // ==================== GALLERY OPERATIONS ====================

    async fn list_photos(&self) -> Result<Vec<GalleryPhoto>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM gallery_photos ORDER BY created_at DESC, id DESC",
            PHOTO_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(photo_from_row).collect())
    }

    async fn get_photo(&self, id: &str) -> Result<Option<GalleryPhoto>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM gallery_photos WHERE id = ?",
            PHOTO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(photo_from_row))
    }

    async fn insert_photo(&self, photo: &GalleryPhoto) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO gallery_photos (id, person_name, original_photo_url, thanksgiving_photo_url, created_at, year) VALUES (?, ?, ?, ?, ?, ?)"
        )
        .bind(&photo.id)
        .bind(&photo.person_name)
        .bind(&photo.original_photo_url)
        .bind(&photo.thanksgiving_photo_url)
        .bind(photo.created_at)
        .bind(photo.year)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_themed_photo(&self, id: &str, url: &str) -> Result<GalleryPhoto, AppError> {
        let result = sqlx::query(
            "UPDATE gallery_photos SET thanksgiving_photo_url = ? WHERE id = ? AND thanksgiving_photo_url IS NULL",
        )
        .bind(url)
        .bind(id)
        .execute(&self.pool)
        .await?;

        let current = self.get_photo(id).await?;
        match current {
            None => Err(AppError::photo_not_found(id)),
            Some(_) if result.rows_affected() == 0 => Err(AppError::Conflict(
                "Photo is already Thanksgiving-ified".to_string(),
            )),
            Some(photo) => Ok(photo),
        }
    }

    async fn delete_photo(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM gallery_photos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::photo_not_found(id));
        }

        Ok(())
    }
}

// Helper functions for row conversion

async fn fetch_dish(conn: &mut SqliteConnection, id: &str) -> Result<Option<Dish>, AppError> {
    let row = sqlx::query(&format!("SELECT {} FROM dishes WHERE id = ?", DISH_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let reaction_rows = sqlx::query("SELECT emoji, count FROM dish_reactions WHERE dish_id = ?")
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

    let mut dish = dish_from_row(&row)?;
    dish.reactions = reaction_rows
        .iter()
        .map(reaction_from_row)
        .collect::<Result<_, _>>()?;
    Ok(Some(dish))
}

async fn write_reactions(
    conn: &mut SqliteConnection,
    dish_id: &str,
    reactions: &BTreeMap<String, u64>,
) -> Result<(), AppError> {
    for (emoji, count) in reactions {
        let count = i64::try_from(*count).map_err(|_| {
            AppError::Validation(format!(
                "Reaction count {} for '{}' exceeds {}",
                count, emoji, MAX_REACTION_COUNT
            ))
        })?;
        sqlx::query("INSERT INTO dish_reactions (dish_id, emoji, count) VALUES (?, ?, ?)")
            .bind(dish_id)
            .bind(emoji)
            .bind(count)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

fn dish_from_row(row: &SqliteRow) -> Result<Dish, AppError> {
    let id: String = row.try_get("id")?;
    let tags_str: String = row.try_get("dietary_tags")?;
    let dietary_tags = parse_tags(&id, &tags_str)?;
    Ok(Dish {
        id,
        dish_name: row.try_get("dish_name")?,
        dietary_tags,
        image_url: row.try_get("image_url")?,
        claimed_by: row.try_get("claimed_by")?,
        reactions: BTreeMap::new(),
        created_at: row.try_get("created_at")?,
        year: row.try_get("year")?,
        version: row.try_get("version")?,
    })
}

fn reaction_from_row(row: &SqliteRow) -> Result<(String, u64), AppError> {
    let emoji: String = row.try_get("emoji")?;
    let count: i64 = row.try_get("count")?;
    let count = u64::try_from(count).map_err(|_| {
        tracing::warn!(emoji = %emoji, count, "Negative reaction count in database");
        AppError::Database(format!("Invalid reaction count {} for '{}'", count, emoji))
    })?;
    Ok((emoji, count))
}

fn photo_from_row(row: &SqliteRow) -> GalleryPhoto {
    GalleryPhoto {
        id: row.get("id"),
        person_name: row.get("person_name"),
        original_photo_url: row.get("original_photo_url"),
        thanksgiving_photo_url: row.get("thanksgiving_photo_url"),
        created_at: row.get("created_at"),
        year: row.get("year"),
    }
}

fn parse_tags(dish_id: &str, raw: &str) -> Result<Vec<DietaryTag>, AppError> {
    serde_json::from_str(raw).map_err(|e| {
        tracing::warn!(dish_id, "Unreadable dietary tags in database: {}", e);
        AppError::Database(format!("Dish {} has unreadable dietary tags", dish_id))
    })
}
