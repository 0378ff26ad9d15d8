use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::{order, order::OrderStatus},
    services::orders::{CheckoutInput, CheckoutQuote},
    ApiResponse, ApiResult, AppState,
};

/// Checkout response: the created order plus the gateway redirect, when a
/// session could be opened. `payment_url: null` with a pending order means
/// session creation failed and should be retried.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CheckoutResponse {
    pub order: order::Model,
    pub payment_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    #[serde(default)]
    pub region: String,
}

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

/// POST /api/v1/checkout
///
/// Creates the order first, then attempts the gateway session. The order
/// commit never depends on the gateway being reachable.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutInput,
    responses(
        (status = 200, description = "Order created", body = CheckoutResponse),
        (status = 400, description = "Empty cart or bad region", body = crate::errors::ErrorResponse),
        (status = 422, description = "A cart line is no longer purchasable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CheckoutInput>,
) -> ApiResult<CheckoutResponse> {
    let order = state.services.orders.create_from_cart(&user, input).await?;
    let payment_url = open_session(&state, &order, Some(user.email.clone())).await;
    let order = match &payment_url {
        Some(_) => state
            .services
            .orders
            .get_order_for_user(order.id, user.id)
            .await?,
        None => order,
    };
    Ok(Json(ApiResponse::success(CheckoutResponse {
        order,
        payment_url,
    })))
}

/// POST /api/v1/checkout/:order_id/session
///
/// Retries gateway session creation for a pending order whose first attempt
/// failed.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/{order_id}/session",
    params(("order_id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Session created", body = CheckoutResponse),
        (status = 409, description = "Order is no longer pending", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway unavailable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn retry_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> ApiResult<CheckoutResponse> {
    let order = state
        .services
        .orders
        .get_order_for_user(order_id, user.id)
        .await?;
    if order.status != OrderStatus::Pending {
        return Err(crate::errors::ServiceError::Conflict(format!(
            "order is {}, only pending orders take payment",
            order.status
        )));
    }

    let (order, items) = state.services.orders.get_order_with_items(order.id).await?;
    let session = state
        .services
        .payments
        .create_session(&order, &items, Some(user.email.clone()))
        .await?;
    let order = state
        .services
        .orders
        .set_payment_session(order.id, &session.id)
        .await?;

    Ok(Json(ApiResponse::success(CheckoutResponse {
        order,
        payment_url: Some(session.url),
    })))
}

/// GET /api/v1/checkout/quote
#[utoipa::path(
    get,
    path = "/api/v1/checkout/quote",
    params(("region" = Option<String>, Query, description = "Region name")),
    responses((status = 200, description = "Totals preview for the current cart")),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn quote(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<QuoteQuery>,
) -> ApiResult<CheckoutQuote> {
    let quote = state.services.orders.quote(user.id, &query.region).await?;
    Ok(Json(ApiResponse::success(quote)))
}

/// GET /api/v1/checkout/success
///
/// Landing endpoint for the gateway redirect. Payment state is owned by the
/// webhook; this only reports what is currently known.
#[utoipa::path(
    get,
    path = "/api/v1/checkout/success",
    params(("session_id" = Option<String>, Query, description = "Gateway session id")),
    responses((status = 200, description = "Order state for the returning shopper")),
    tag = "Checkout"
)]
pub async fn success(
    State(state): State<AppState>,
    Query(query): Query<SuccessQuery>,
) -> ApiResult<serde_json::Value> {
    let order = match &query.session_id {
        Some(session_id) => state.services.orders.find_by_session_id(session_id).await?,
        None => None,
    };
    let body = match order {
        Some(order) => serde_json::json!({
            "order_id": order.id,
            "status": order.status,
            "message": "Thanks for your order."
        }),
        None => serde_json::json!({
            "message": "Thanks for your order. Confirmation is on its way."
        }),
    };
    Ok(Json(ApiResponse::success(body)))
}

/// GET /api/v1/checkout/cancel
#[utoipa::path(
    get,
    path = "/api/v1/checkout/cancel",
    responses((status = 200, description = "Abandonment landing; the order stays pending")),
    tag = "Checkout"
)]
pub async fn cancel() -> ApiResult<serde_json::Value> {
    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Payment cancelled. Your order is saved and can be paid later."
    }))))
}

/// Best-effort session creation after the order commit. Failure leaves the
/// order pending with no session id.
async fn open_session(
    state: &AppState,
    order: &order::Model,
    customer_email: Option<String>,
) -> Option<String> {
    if !state.services.payments.is_configured() {
        return None;
    }

    let (order, items) = match state.services.orders.get_order_with_items(order.id).await {
        Ok(pair) => pair,
        Err(e) => {
            warn!(order_id = %order.id, "could not load order for session creation: {}", e);
            return None;
        }
    };

    match state
        .services
        .payments
        .create_session(&order, &items, customer_email)
        .await
    {
        Ok(session) => {
            if let Err(e) = state
                .services
                .orders
                .set_payment_session(order.id, &session.id)
                .await
            {
                warn!(order_id = %order.id, "could not record session id: {}", e);
            }
            Some(session.url)
        }
        Err(e) => {
            warn!(order_id = %order.id, "payment session creation failed: {}", e);
            None
        }
    }
}
