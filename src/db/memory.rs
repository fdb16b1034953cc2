//! Process-local store for development without a database file.
//!
//! Each mutation runs while holding the entry's write guard, so a claim or a
//! reaction is a single atomic read-modify-write per key. Nothing survives a restart.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::Store;
use crate::errors::AppError;
use crate::models::{Dish, DishChange, GalleryPhoto, MAX_REACTION_COUNT};

#[derive(Default)]
pub struct MemoryStore {
    dishes: DashMap<String, Dish>,
    photos: DashMap<String, GalleryPhoto>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Newest first; ids break ties so both backends agree.
fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (i64, &str)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl Store for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn list_dishes(&self) -> Result<Vec<Dish>, AppError> {
        let mut dishes: Vec<Dish> = self.dishes.iter().map(|e| e.value().clone()).collect();
        newest_first(&mut dishes, |d| (d.created_at, d.id.as_str()));
        Ok(dishes)
    }

    async fn get_dish(&self, id: &str) -> Result<Option<Dish>, AppError> {
        Ok(self.dishes.get(id).map(|d| d.value().clone()))
    }

    async fn insert_dish(&self, dish: &Dish) -> Result<(), AppError> {
        match self.dishes.entry(dish.id.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "Dish {} already exists",
                dish.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(dish.clone());
                Ok(())
            }
        }
    }

    async fn update_dish(&self, id: &str, changes: &[DishChange]) -> Result<Dish, AppError> {
        let mut entry = self
            .dishes
            .get_mut(id)
            .ok_or_else(|| AppError::dish_not_found(id))?;

        // Work on a copy so a failing change leaves the stored dish intact
        let mut updated = entry.clone();
        for change in changes {
            updated.apply(change)?;
        }
        updated.version += 1;
        *entry = updated.clone();
        Ok(updated)
    }

    async fn delete_dish(&self, id: &str) -> Result<(), AppError> {
        self.dishes
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AppError::dish_not_found(id))
    }

    async fn claim_dish(&self, id: &str, person_name: &str) -> Result<Dish, AppError> {
        let mut entry = self
            .dishes
            .get_mut(id)
            .ok_or_else(|| AppError::dish_not_found(id))?;

        if let Some(owner) = &entry.claimed_by {
            return Err(AppError::already_claimed(owner));
        }
        entry.claimed_by = Some(person_name.to_string());
        entry.version += 1;
        Ok(entry.clone())
    }

    async fn add_reaction(&self, id: &str, emoji: &str) -> Result<Dish, AppError> {
        let mut entry = self
            .dishes
            .get_mut(id)
            .ok_or_else(|| AppError::dish_not_found(id))?;

        // Counts stop at the cap instead of wrapping
        let count = entry.reactions.entry(emoji.to_string()).or_insert(0);
        *count = count.saturating_add(1).min(MAX_REACTION_COUNT);
        entry.version += 1;
        Ok(entry.clone())
    }

    async fn list_photos(&self) -> Result<Vec<GalleryPhoto>, AppError> {
        let mut photos: Vec<GalleryPhoto> =
            self.photos.iter().map(|e| e.value().clone()).collect();
        newest_first(&mut photos, |p| (p.created_at, p.id.as_str()));
        Ok(photos)
    }

    async fn get_photo(&self, id: &str) -> Result<Option<GalleryPhoto>, AppError> {
        Ok(self.photos.get(id).map(|p| p.value().clone()))
    }

    async fn insert_photo(&self, photo: &GalleryPhoto) -> Result<(), AppError> {
        match self.photos.entry(photo.id.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "Photo {} already exists",
                photo.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(photo.clone());
                Ok(())
            }
        }
    }

    async fn set_themed_photo(&self, id: &str, url: &str) -> Result<GalleryPhoto, AppError> {
        let mut entry = self
            .photos
            .get_mut(id)
            .ok_or_else(|| AppError::photo_not_found(id))?;

        if entry.is_themed() {
            return Err(AppError::Conflict(
                "Photo is already Thanksgiving-ified".to_string(),
            ));
        }
        entry.thanksgiving_photo_url = Some(url.to_string());
        Ok(entry.clone())
    }

    async fn delete_photo(&self, id: &str) -> Result<(), AppError> {
        self.photos
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AppError::photo_not_found(id))
    }
}
