use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use axum::response::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::{order, order_item},
    errors::ServiceError,
    services::receipts::Receipt,
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// GET /api/v1/orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(
        ("page" = Option<u64>, Query, description = "Page number (1-based)"),
        ("limit" = Option<u64>, Query, description = "Page size")
    ),
    responses((status = 200, description = "The caller's orders, newest first")),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<order::Model>> {
    let (orders, total) = state
        .services
        .orders
        .list_orders_for_user(user.id, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        orders, total, &query,
    ))))
}

/// GET /api/v1/orders/:id
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with its item snapshots"),
        (status = 404, description = "Not the caller's order", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetail> {
    // Ownership check first; the detail read is unscoped.
    state.services.orders.get_order_for_user(id, user.id).await?;
    let (order, items) = state.services.orders.get_order_with_items(id).await?;
    Ok(Json(ApiResponse::success(OrderDetail { order, items })))
}

/// GET /api/v1/orders/:id/receipt
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/receipt",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Rendered receipt document"),
        (status = 404, description = "Not the caller's order", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_receipt(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.orders.get_order_for_user(id, user.id).await?;
    let (order, items) = state.services.orders.get_order_with_items(id).await?;

    let receipt = Receipt::from_order(&order, &items);
    let renderer = &state.services.receipts;
    let body = renderer.render(&receipt);

    let disposition = format!("attachment; filename=\"{}\"", renderer.file_name(&receipt));
    let mut response = (StatusCode::OK, body).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(renderer.content_type()),
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}
