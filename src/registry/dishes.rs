//! Dish list operations: validation, image policy and claim/react transitions.

use std::sync::Arc;

use crate::badges::{self, Badge};
use crate::db::Store;
use crate::errors::AppError;
use crate::images::ImageService;
use crate::models::{
    required, CreateDishRequest, DietaryTag, Dish, DishChange, UpdateDishRequest,
};

/// Longest accepted reaction key, in chars.
const MAX_EMOJI_CHARS: usize = 16;

/// The dish list and its claim/react transitions.
pub struct DishRegistry {
    store: Arc<dyn Store>,
    images: ImageService,
}

impl DishRegistry {
    pub fn new(store: Arc<dyn Store>, images: ImageService) -> Self {
        Self { store, images }
    }

    /// All dishes, newest first.
    pub async fn list(&self) -> Result<Vec<Dish>, AppError> {
        self.store.list_dishes().await
    }

    pub async fn get(&self, id: &str) -> Result<Dish, AppError> {
        self.store
            .get_dish(id)
            .await?
            .ok_or_else(|| AppError::dish_not_found(id))
    }

    /// Create a dish and render its image. Image failures fall back to a placeholder.
    pub async fn create(&self, request: &CreateDishRequest) -> Result<Dish, AppError> {
        let name = required("Dish name", &request.dish_name)?;
        let raw_tags = request
            .dietary_tags
            .as_deref()
            .ok_or_else(|| AppError::Validation("dietaryTags must be an array".to_string()))?;
        let tags = DietaryTag::parse_all(raw_tags)?;

        let image_url = self.images.dish_image(&name).await;
        let dish = Dish::new(&name, tags, image_url);
        self.store.insert_dish(&dish).await?;

        tracing::info!(dish_id = %dish.id, dish = %dish.dish_name, "Dish created");
        Ok(dish)
    }

    /// Apply a partial update. A rename to a different name regenerates the image
    /// unless the same request sets one explicitly.
    pub async fn update(&self, id: &str, request: UpdateDishRequest) -> Result<Dish, AppError> {
        let mut changes = request.into_changes()?;
        if changes.is_empty() {
            return self.get(id).await;
        }

        let current = self.get(id).await?;

        let new_name = changes.iter().find_map(|c| match c {
            DishChange::Rename(name) => Some(required("Dish name", name)),
            _ => None,
        });
        let explicit_image = changes
            .iter()
            .any(|c| matches!(c, DishChange::ReassignImage(_)));

        if let Some(name) = new_name.transpose()? {
            if name != current.dish_name && !explicit_image {
                let image_url = self.images.dish_image(&name).await;
                changes.push(DishChange::ReassignImage(image_url));
            }
        }

        let dish = self.store.update_dish(id, &changes).await?;
        tracing::info!(dish_id = %id, changes = changes.len(), "Dish updated");
        Ok(dish)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.store.delete_dish(id).await?;
        tracing::info!(dish_id = %id, "Dish deleted");
        Ok(())
    }

    /// Assign an owner. Succeeds exactly once per dish.
    pub async fn claim(&self, id: &str, person_name: &str) -> Result<Dish, AppError> {
        let person = required("Person name", person_name)?;

        let result = self.store.claim_dish(id, &person).await;
        match &result {
            Ok(_) => tracing::info!(dish_id = %id, person = %person, "Dish claimed"),
            Err(AppError::AlreadyClaimed { claimed_by, .. }) => {
                tracing::info!(dish_id = %id, person = %person, owner = %claimed_by, "Claim rejected")
            }
            Err(_) => {}
        }
        result
    }

    /// Add one to the dish's count for `emoji`.
    pub async fn react(&self, id: &str, emoji: &str) -> Result<Dish, AppError> {
        let emoji = required("Emoji", emoji)?;
        if emoji.chars().count() > MAX_EMOJI_CHARS {
            return Err(AppError::Validation(format!(
                "Emoji must be at most {} characters",
                MAX_EMOJI_CHARS
            )));
        }

        self.store.add_reaction(id, &emoji).await
    }

    /// Badges for one dish, computed over the current dish set.
    pub async fn badges(&self, id: &str) -> Result<Vec<Badge>, AppError> {
        let all = self.list().await?;
        let dish = all
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| AppError::dish_not_found(id))?;
        Ok(badges::evaluate(dish, &all))
    }
}
