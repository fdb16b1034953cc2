//! Admin dish management. Mounted behind the PSK layer.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{ApiResponse, ApiResult};
use crate::models::{CreateDishRequest, Dish, UpdateDishRequest};
use crate::AppState;

/// POST /api/admin/dishes - Create a dish and generate its image.
pub async fn create_dish(
    State(state): State<AppState>,
    Json(request): Json<CreateDishRequest>,
) -> ApiResult<Dish> {
    let dish = state.dishes.create(&request).await?;
    Ok(ApiResponse::created(dish))
}

/// PUT /api/admin/dishes/:id - Partial update.
pub async fn update_dish(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateDishRequest>,
) -> ApiResult<Dish> {
    let dish = state.dishes.update(&id, request).await?;
    Ok(ApiResponse::ok(dish))
}

/// DELETE /api/admin/dishes/:id - Delete a dish.
pub async fn delete_dish(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.dishes.delete(&id).await?;
    Ok(ApiResponse::ok(()))
}
