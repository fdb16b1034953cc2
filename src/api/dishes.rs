//! Public dish endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{ApiResponse, ApiResult};
use crate::badges::Badge;
use crate::models::{ClaimDishRequest, Dish, ReactRequest};
use crate::AppState;

/// GET /api/dishes - List all dishes, newest first.
pub async fn list_dishes(State(state): State<AppState>) -> ApiResult<Vec<Dish>> {
    Ok(ApiResponse::ok(state.dishes.list().await?))
}

/// GET /api/dishes/:id - Get a single dish.
pub async fn get_dish(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Dish> {
    Ok(ApiResponse::ok(state.dishes.get(&id).await?))
}

/// GET /api/dishes/:id/badges - Badges earned by a dish right now.
pub async fn get_dish_badges(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Badge>> {
    Ok(ApiResponse::ok(state.dishes.badges(&id).await?))
}

/// POST /api/dishes/:id/claim - Claim an unclaimed dish.
pub async fn claim_dish(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ClaimDishRequest>,
) -> ApiResult<Dish> {
    let dish = state.dishes.claim(&id, &request.person_name).await?;
    Ok(ApiResponse::ok(dish))
}

/// POST /api/dishes/:id/react - Add one reaction.
pub async fn react_to_dish(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ReactRequest>,
) -> ApiResult<Dish> {
    let dish = state.dishes.react(&id, &request.emoji).await?;
    Ok(ApiResponse::ok(dish))
}
