use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    entities::cart_item,
    services::carts::{CartLine, SessionLine},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SetQuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct MergeRequest {
    pub lines: Vec<SessionLine>,
}

/// GET /api/v1/cart
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses((status = 200, description = "Current cart lines")),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<CartLine>> {
    let lines = state.services.carts.lines(user.id).await?;
    Ok(Json(ApiResponse::success(lines)))
}

/// POST /api/v1/cart/items
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Line added or quantity increased"),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
        (status = 422, description = "Product is delisted", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<AddItemRequest>,
) -> ApiResult<cart_item::Model> {
    request.validate()?;
    let item = state
        .services
        .carts
        .add_item(user.id, request.product_id, request.quantity)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}

/// PUT /api/v1/cart/items/:product_id
#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product id")),
    request_body = SetQuantityRequest,
    responses((status = 200, description = "Quantity updated; zero removes the line")),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn set_quantity(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(request): Json<SetQuantityRequest>,
) -> ApiResult<()> {
    state
        .services
        .carts
        .set_quantity(user.id, product_id, request.quantity)
        .await?;
    Ok(Json(ApiResponse::success(())))
}

/// DELETE /api/v1/cart/items/:product_id
#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product id")),
    responses((status = 200, description = "Line removed")),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> ApiResult<()> {
    state.services.carts.remove_item(user.id, product_id).await?;
    Ok(Json(ApiResponse::success(())))
}

/// POST /api/v1/cart/merge
#[utoipa::path(
    post,
    path = "/api/v1/cart/merge",
    request_body = MergeRequest,
    responses((status = 200, description = "Session cart folded into the account cart")),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn merge_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<MergeRequest>,
) -> ApiResult<serde_json::Value> {
    let merged = state.services.carts.merge(user.id, &request.lines).await?;
    Ok(Json(ApiResponse::success(
        serde_json::json!({ "merged_lines": merged }),
    )))
}
