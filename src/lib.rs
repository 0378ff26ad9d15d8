//! MapleCart API Library
//!
//! Headless storefront backend: catalog, carts, checkout with GST/PST/HST
//! composition, hosted payment sessions, webhook reconciliation, and the
//! order lifecycle.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Common query parameters for list endpoints.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

/// Standard response envelope.
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, query: &ListQuery) -> Self {
        let limit = query.limit.max(1);
        Self {
            items,
            total,
            page: query.page.max(1),
            limit,
            total_pages: total.div_ceil(limit),
        }
    }
}

/// Standard API result type for JSON responses.
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// All `/api/v1` routes.
pub fn api_v1_routes() -> Router<AppState> {
    let storefront = Router::new()
        .route("/products", get(handlers::products::list_products))
        .route("/products/:id", get(handlers::products::get_product))
        .route("/regions", get(handlers::products::list_regions));

    let cart = Router::new()
        .route("/cart", get(handlers::carts::get_cart))
        .route("/cart/items", post(handlers::carts::add_item))
        .route("/cart/items/:product_id", put(handlers::carts::set_quantity))
        .route(
            "/cart/items/:product_id",
            delete(handlers::carts::remove_item),
        )
        .route("/cart/merge", post(handlers::carts::merge_cart));

    let checkout = Router::new()
        .route("/checkout", post(handlers::checkout::checkout))
        .route("/checkout/quote", get(handlers::checkout::quote))
        .route(
            "/checkout/:order_id/session",
            post(handlers::checkout::retry_session),
        )
        .route("/checkout/success", get(handlers::checkout::success))
        .route("/checkout/cancel", get(handlers::checkout::cancel));

    let orders = Router::new()
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/orders/:id/receipt", get(handlers::orders::get_receipt));

    let payments = Router::new().route(
        "/payments/webhook",
        post(handlers::payment_webhooks::payment_webhook),
    );

    let admin = Router::new()
        .route("/resources", get(handlers::admin::list_resources))
        .route("/orders", get(handlers::admin::list_orders))
        .route(
            "/orders/:id/status",
            put(handlers::admin::update_order_status),
        )
        .route("/products", get(handlers::admin::list_products))
        .route("/products", post(handlers::admin::create_product))
        .route("/products/:id", put(handlers::admin::update_product))
        .route("/products/:id", delete(handlers::admin::delist_product))
        .route("/regions", post(handlers::admin::create_region))
        .route("/regions/:id", put(handlers::admin::update_region))
        .route("/coupons", get(handlers::admin::list_coupons))
        .route("/coupons", post(handlers::admin::create_coupon))
        .route("/coupons/:id", put(handlers::admin::update_coupon))
        .route("/coupons/:id", delete(handlers::admin::delete_coupon));

    Router::new()
        .merge(storefront)
        .merge(cart)
        .merge(checkout)
        .merge(orders)
        .merge(payments)
        .nest("/admin", admin)
}

/// Full application router, including `/health`.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": { "database": db_status },
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
