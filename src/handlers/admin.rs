use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AdminUser,
    entities::{
        coupon, coupon::CouponKind, order, order::OrderStatus, product, region, Coupon, Product,
        Region,
    },
    errors::ServiceError,
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};

/// Declarative description of one admin-managed resource: which fields a
/// write may set, which columns the list view shows, and which filters the
/// list accepts. Serving this table lets the admin frontend build its forms
/// without hardcoding the schema.
#[derive(Debug, Serialize)]
pub struct AdminResource {
    pub name: &'static str,
    pub permitted_fields: &'static [&'static str],
    pub list_columns: &'static [&'static str],
    pub filters: &'static [&'static str],
}

pub const ADMIN_RESOURCES: &[AdminResource] = &[
    AdminResource {
        name: "orders",
        permitted_fields: &["status"],
        list_columns: &[
            "id",
            "shipping_name",
            "region",
            "total",
            "status",
            "created_at",
        ],
        filters: &["status"],
    },
    AdminResource {
        name: "products",
        permitted_fields: &[
            "name",
            "description",
            "price",
            "category",
            "image_attachment_id",
            "active",
        ],
        list_columns: &["id", "name", "price", "category", "active"],
        filters: &["active"],
    },
    AdminResource {
        name: "regions",
        permitted_fields: &["name", "gst", "pst", "hst"],
        list_columns: &["id", "name", "gst", "pst", "hst"],
        filters: &[],
    },
    AdminResource {
        name: "coupons",
        permitted_fields: &[
            "code",
            "kind",
            "value",
            "active",
            "starts_at",
            "ends_at",
            "max_uses",
        ],
        list_columns: &["id", "code", "kind", "value", "active", "uses_count"],
        filters: &["active"],
    },
];

/// GET /api/v1/admin/resources
#[utoipa::path(
    get,
    path = "/api/v1/admin/resources",
    responses((status = 200, description = "Admin resource table")),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_resources(_admin: AdminUser) -> ApiResult<&'static [AdminResource]> {
    Ok(Json(ApiResponse::success(ADMIN_RESOURCES)))
}

// ---- Orders ----

#[derive(Debug, Deserialize)]
pub struct AdminOrderQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub status: Option<OrderStatus>,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// GET /api/v1/admin/orders
#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    params(("status" = Option<String>, Query, description = "Filter by status")),
    responses((status = 200, description = "All orders, newest first")),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AdminOrderQuery>,
) -> ApiResult<PaginatedResponse<order::Model>> {
    let (orders, total) = state
        .services
        .orders
        .list_orders_admin(query.status, query.page, query.limit)
        .await?;
    let list = ListQuery {
        page: query.page,
        limit: query.limit,
    };
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        orders, total, &list,
    ))))
}

/// PUT /api/v1/admin/orders/:id/status
#[utoipa::path(
    put,
    path = "/api/v1/admin/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status changed (or already there)"),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<order::Model> {
    let order = state
        .services
        .order_status
        .transition(id, request.status, None)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

// ---- Products ----

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct ProductInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub category: Option<String>,
    pub image_attachment_id: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl ProductInput {
    fn checked_price(&self) -> Result<Decimal, ServiceError> {
        if self.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price must not be negative".to_string(),
            ));
        }
        Ok(self.price)
    }
}

/// GET /api/v1/admin/products
#[utoipa::path(
    get,
    path = "/api/v1/admin/products",
    responses((status = 200, description = "All products, delisted included")),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_products(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<product::Model>> {
    let (items, total) = state
        .services
        .products
        .list(query.page, query.limit, false)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, &query,
    ))))
}

/// POST /api/v1/admin/products
#[utoipa::path(
    post,
    path = "/api/v1/admin/products",
    request_body = ProductInput,
    responses((status = 200, description = "Product created")),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<ProductInput>,
) -> ApiResult<product::Model> {
    input.validate()?;
    let now = Utc::now();
    let saved = product::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(input.name.clone()),
        description: Set(input.description.clone()),
        price: Set(input.checked_price()?),
        category: Set(input.category.clone()),
        image_attachment_id: Set(input.image_attachment_id.clone()),
        active: Set(input.active),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*state.db)
    .await?;
    Ok(Json(ApiResponse::success(saved)))
}

/// PUT /api/v1/admin/products/:id
#[utoipa::path(
    put,
    path = "/api/v1/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = ProductInput,
    responses((status = 200, description = "Product updated")),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(input): Json<ProductInput>,
) -> ApiResult<product::Model> {
    input.validate()?;
    let existing = Product::find_by_id(id)
        .one(&*state.db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

    let price = input.checked_price()?;
    let mut active: product::ActiveModel = existing.into();
    active.name = Set(input.name);
    active.description = Set(input.description);
    active.price = Set(price);
    active.category = Set(input.category);
    active.image_attachment_id = Set(input.image_attachment_id);
    active.active = Set(input.active);
    active.updated_at = Set(Utc::now());
    let saved = active.update(&*state.db).await?;
    Ok(Json(ApiResponse::success(saved)))
}

/// DELETE /api/v1/admin/products/:id
///
/// Delists rather than deletes: order item snapshots keep their product ids.
#[utoipa::path(
    delete,
    path = "/api/v1/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses((status = 200, description = "Product delisted")),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delist_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<product::Model> {
    let existing = Product::find_by_id(id)
        .one(&*state.db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;
    let mut active: product::ActiveModel = existing.into();
    active.active = Set(false);
    active.updated_at = Set(Utc::now());
    let saved = active.update(&*state.db).await?;
    Ok(Json(ApiResponse::success(saved)))
}

// ---- Regions ----

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct RegionInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub gst: Option<Decimal>,
    pub pst: Option<Decimal>,
    pub hst: Option<Decimal>,
}

async fn region_name_taken(
    state: &AppState,
    name: &str,
    exclude: Option<Uuid>,
) -> Result<bool, ServiceError> {
    let mut condition = Condition::all().add(
        Expr::expr(Func::lower(Expr::col(region::Column::Name))).eq(name.to_lowercase()),
    );
    if let Some(id) = exclude {
        condition = condition.add(region::Column::Id.ne(id));
    }
    let count = Region::find()
        .filter(condition)
        .count(&*state.db)
        .await?;
    Ok(count > 0)
}

/// POST /api/v1/admin/regions
///
/// Region names must be unique ignoring case; "ontario" and "Ontario" would
/// otherwise be two different tax jurisdictions.
#[utoipa::path(
    post,
    path = "/api/v1/admin/regions",
    request_body = RegionInput,
    responses(
        (status = 200, description = "Region created"),
        (status = 409, description = "Name already in use", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_region(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<RegionInput>,
) -> ApiResult<region::Model> {
    input.validate()?;
    if region_name_taken(&state, &input.name, None).await? {
        return Err(ServiceError::Conflict(format!(
            "region '{}' already exists",
            input.name
        )));
    }
    let saved = region::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(input.name),
        gst: Set(input.gst),
        pst: Set(input.pst),
        hst: Set(input.hst),
    }
    .insert(&*state.db)
    .await?;
    Ok(Json(ApiResponse::success(saved)))
}

/// PUT /api/v1/admin/regions/:id
#[utoipa::path(
    put,
    path = "/api/v1/admin/regions/{id}",
    params(("id" = Uuid, Path, description = "Region id")),
    request_body = RegionInput,
    responses((status = 200, description = "Region updated")),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_region(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(input): Json<RegionInput>,
) -> ApiResult<region::Model> {
    input.validate()?;
    let existing = Region::find_by_id(id)
        .one(&*state.db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Region {} not found", id)))?;
    if region_name_taken(&state, &input.name, Some(id)).await? {
        return Err(ServiceError::Conflict(format!(
            "region '{}' already exists",
            input.name
        )));
    }
    let mut active: region::ActiveModel = existing.into();
    active.name = Set(input.name);
    active.gst = Set(input.gst);
    active.pst = Set(input.pst);
    active.hst = Set(input.hst);
    let saved = active.update(&*state.db).await?;
    Ok(Json(ApiResponse::success(saved)))
}

// ---- Coupons ----

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CouponInput {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    pub kind: CouponKind,
    pub value: Decimal,
    #[serde(default = "default_true")]
    pub active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub max_uses: Option<i32>,
}

fn validate_coupon(input: &CouponInput) -> Result<(), ServiceError> {
    input.validate()?;
    coupon::validate_value(input.kind, input.value).map_err(ServiceError::ValidationError)?;
    if let (Some(starts), Some(ends)) = (input.starts_at, input.ends_at) {
        if ends <= starts {
            return Err(ServiceError::ValidationError(
                "ends_at must be after starts_at".to_string(),
            ));
        }
    }
    if let Some(max_uses) = input.max_uses {
        if max_uses < 1 {
            return Err(ServiceError::ValidationError(
                "max_uses must be at least 1".to_string(),
            ));
        }
    }
    Ok(())
}

/// GET /api/v1/admin/coupons
#[utoipa::path(
    get,
    path = "/api/v1/admin/coupons",
    responses((status = 200, description = "All coupons")),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_coupons(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<coupon::Model>> {
    let paginator = Coupon::find()
        .order_by_asc(coupon::Column::Code)
        .paginate(&*state.db, query.limit.max(1));
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(query.page.saturating_sub(1)).await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, &query,
    ))))
}

/// POST /api/v1/admin/coupons
#[utoipa::path(
    post,
    path = "/api/v1/admin/coupons",
    request_body = CouponInput,
    responses(
        (status = 200, description = "Coupon created"),
        (status = 400, description = "Value out of range for kind", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<CouponInput>,
) -> ApiResult<coupon::Model> {
    validate_coupon(&input)?;
    let now = Utc::now();
    let saved = coupon::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(input.code),
        kind: Set(input.kind),
        value: Set(input.value),
        active: Set(input.active),
        starts_at: Set(input.starts_at),
        ends_at: Set(input.ends_at),
        max_uses: Set(input.max_uses),
        uses_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*state.db)
    .await?;
    Ok(Json(ApiResponse::success(saved)))
}

/// PUT /api/v1/admin/coupons/:id
#[utoipa::path(
    put,
    path = "/api/v1/admin/coupons/{id}",
    params(("id" = Uuid, Path, description = "Coupon id")),
    request_body = CouponInput,
    responses((status = 200, description = "Coupon updated")),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_coupon(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(input): Json<CouponInput>,
) -> ApiResult<coupon::Model> {
    validate_coupon(&input)?;
    let existing = Coupon::find_by_id(id)
        .one(&*state.db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", id)))?;
    let mut active: coupon::ActiveModel = existing.into();
    active.code = Set(input.code);
    active.kind = Set(input.kind);
    active.value = Set(input.value);
    active.active = Set(input.active);
    active.starts_at = Set(input.starts_at);
    active.ends_at = Set(input.ends_at);
    active.max_uses = Set(input.max_uses);
    active.updated_at = Set(Utc::now());
    let saved = active.update(&*state.db).await?;
    Ok(Json(ApiResponse::success(saved)))
}

/// DELETE /api/v1/admin/coupons/:id
#[utoipa::path(
    delete,
    path = "/api/v1/admin/coupons/{id}",
    params(("id" = Uuid, Path, description = "Coupon id")),
    responses((status = 200, description = "Coupon removed")),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_coupon(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    let result = Coupon::delete_by_id(id).exec(&*state.db).await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::NotFound(format!("Coupon {} not found", id)));
    }
    Ok(Json(ApiResponse::success(())))
}
