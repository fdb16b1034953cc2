//! Dish model matching the frontend Dish interface.

use std::collections::BTreeMap;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::new_id;
use crate::errors::AppError;

/// Dietary labels a dish can carry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DietaryTag {
    Vegetarian,
    Vegan,
    GlutenFree,
    DairyFree,
    NutFree,
}

impl DietaryTag {
    pub const ALL: [DietaryTag; 5] = [
        DietaryTag::Vegetarian,
        DietaryTag::Vegan,
        DietaryTag::GlutenFree,
        DietaryTag::DairyFree,
        DietaryTag::NutFree,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DietaryTag::Vegetarian => "vegetarian",
            DietaryTag::Vegan => "vegan",
            DietaryTag::GlutenFree => "gluten-free",
            DietaryTag::DairyFree => "dairy-free",
            DietaryTag::NutFree => "nut-free",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|tag| tag.as_str() == s)
    }

    /// Parse raw tag strings into a sorted, duplicate-free set.
    pub fn parse_all(raw: &[String]) -> Result<Vec<Self>, AppError> {
        let mut tags = Vec::with_capacity(raw.len());
        for value in raw {
            let tag = Self::parse(value).ok_or_else(|| {
                AppError::Validation(format!(
                    "Unknown dietary tag '{}' (expected one of: {})",
                    value,
                    Self::ALL.map(|t| t.as_str()).join(", ")
                ))
            })?;
            tags.push(tag);
        }
        tags.sort();
        tags.dedup();
        Ok(tags)
    }
}

/// Largest count a single reaction can hold; SQLite stores counts as signed 64-bit.
pub const MAX_REACTION_COUNT: u64 = i64::MAX as u64;

/// A potluck dish, claimable by exactly one person.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dish {
    pub id: String,
    pub dish_name: String,
    pub dietary_tags: Vec<DietaryTag>,
    pub image_url: String,
    pub claimed_by: Option<String>,
    #[serde(default)]
    pub reactions: BTreeMap<String, u64>,
    /// Epoch milliseconds
    pub created_at: i64,
    pub year: i32,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

impl Dish {
    /// Build a fresh, unclaimed dish.
    pub fn new(dish_name: &str, dietary_tags: Vec<DietaryTag>, image_url: String) -> Self {
        let now = Utc::now();
        Self {
            id: new_id("dish"),
            dish_name: dish_name.trim().to_string(),
            dietary_tags,
            image_url,
            claimed_by: None,
            reactions: BTreeMap::new(),
            created_at: now.timestamp_millis(),
            year: now.year(),
            version: 1,
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed_by.is_some()
    }

    /// Sum of all emoji counts, saturating at `u64::MAX`.
    pub fn total_reactions(&self) -> u64 {
        self.reactions
            .values()
            .fold(0u64, |total, count| total.saturating_add(*count))
    }

    /// Apply a single update intent. Leaves `self` untouched on error.
    pub fn apply(&mut self, change: &DishChange) -> Result<(), AppError> {
        match change {
            DishChange::Rename(name) => {
                self.dish_name = required("Dish name", name)?;
            }
            DishChange::Retag(tags) => {
                let mut tags = tags.clone();
                tags.sort();
                tags.dedup();
                self.dietary_tags = tags;
            }
            DishChange::ReassignImage(url) => {
                self.image_url = required("Image URL", url)?;
            }
            DishChange::SetClaim(person) => {
                let person = required("Person name", person)?;
                if let Some(owner) = &self.claimed_by {
                    return Err(AppError::already_claimed(owner));
                }
                self.claimed_by = Some(person);
            }
            DishChange::SetReactions(reactions) => {
                check_reaction_counts(reactions)?;
                self.reactions = reactions.clone();
            }
        }
        Ok(())
    }
}

/// Trim `value` and reject it when nothing is left.
pub(crate) fn required(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn check_reaction_counts(reactions: &BTreeMap<String, u64>) -> Result<(), AppError> {
    match reactions.iter().find(|(_, count)| **count > MAX_REACTION_COUNT) {
        Some((emoji, count)) => Err(AppError::Validation(format!(
            "Reaction count {} for '{}' exceeds {}",
            count, emoji, MAX_REACTION_COUNT
        ))),
        None => Ok(()),
    }
}

/// The closed set of partial updates a dish accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum DishChange {
    Rename(String),
    Retag(Vec<DietaryTag>),
    ReassignImage(String),
    SetClaim(String),
    SetReactions(BTreeMap<String, u64>),
}

/// Request body for creating a new dish.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDishRequest {
    #[serde(default)]
    pub dish_name: String,
    #[serde(default)]
    pub dietary_tags: Option<Vec<String>>,
}

/// Request body for updating an existing dish.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDishRequest {
    #[serde(default)]
    pub dish_name: Option<String>,
    #[serde(default)]
    pub dietary_tags: Option<Vec<String>>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub claimed_by: Option<String>,
    #[serde(default)]
    pub reactions: Option<BTreeMap<String, u64>>,
}

impl UpdateDishRequest {
    /// Translate the field bag into update intents, validating tags on the way.
    pub fn into_changes(self) -> Result<Vec<DishChange>, AppError> {
        let mut changes = Vec::new();
        if let Some(name) = self.dish_name {
            changes.push(DishChange::Rename(name));
        }
        if let Some(tags) = self.dietary_tags {
            changes.push(DishChange::Retag(DietaryTag::parse_all(&tags)?));
        }
        if let Some(url) = self.image_url {
            changes.push(DishChange::ReassignImage(url));
        }
        if let Some(person) = self.claimed_by {
            changes.push(DishChange::SetClaim(person));
        }
        if let Some(reactions) = self.reactions {
            check_reaction_counts(&reactions)?;
            changes.push(DishChange::SetReactions(reactions));
        }
        Ok(changes)
    }
}

/// Request body for claiming a dish.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimDishRequest {
    #[serde(default)]
    pub person_name: String,
}

/// Request body for reacting to a dish.
#[derive(Debug, Clone, Deserialize)]
pub struct ReactRequest {
    #[serde(default)]
    pub emoji: String,
}
