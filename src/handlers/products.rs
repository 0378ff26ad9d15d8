use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use uuid::Uuid;

use crate::{
    entities::{product, region},
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};

/// GET /api/v1/products
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(
        ("page" = Option<u64>, Query, description = "Page number (1-based)"),
        ("limit" = Option<u64>, Query, description = "Page size")
    ),
    responses((status = 200, description = "Active products")),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<product::Model>> {
    let (items, total) = state
        .services
        .products
        .list(query.page, query.limit, true)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, &query,
    ))))
}

/// GET /api/v1/products/:id
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product detail"),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<product::Model> {
    let product = state.services.products.find(id).await?;
    Ok(Json(ApiResponse::success(product)))
}

/// GET /api/v1/regions
#[utoipa::path(
    get,
    path = "/api/v1/regions",
    responses((status = 200, description = "Tax regions, ordered by name")),
    tag = "Regions"
)]
pub async fn list_regions(State(state): State<AppState>) -> ApiResult<Vec<region::Model>> {
    let regions = state.services.tax.list().await?;
    Ok(Json(ApiResponse::success(regions)))
}
