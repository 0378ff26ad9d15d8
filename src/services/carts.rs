use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{cart_item, product, CartItem, Product},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// One cart line joined with its product, as served to the storefront.
#[derive(Debug, Serialize)]
pub struct CartLine {
    pub item: cart_item::Model,
    pub product: Option<product::Model>,
}

/// A (product, quantity) pair from a session-scoped anonymous cart, folded
/// into the persisted cart at sign-in.
#[derive(Debug, Clone, serde::Deserialize, utoipa::ToSchema)]
pub struct SessionLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Persisted per-user cart: one row per (user, product) pair. Quantities are
/// strictly positive; setting a quantity to zero or less deletes the row.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    events: EventSender,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, events: EventSender) -> Self {
        Self { db, events }
    }

    /// The user's cart lines with their products, oldest first. A line whose
    /// product has since been deleted is still returned (`product: None`) so
    /// the storefront can show it; checkout rejects it explicitly.
    pub async fn lines(&self, user_id: Uuid) -> Result<Vec<CartLine>, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(item, product)| CartLine { item, product })
            .collect())
    }

    /// Adds a product to the cart, incrementing the quantity if the line
    /// already exists.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be a positive integer".to_string(),
            ));
        }

        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;
        if !product.active {
            return Err(ServiceError::ProductUnavailable(product_id));
        }

        let txn = self.db.begin().await?;

        let existing = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;

        let saved = if let Some(item) = existing {
            let current = item.quantity;
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(current + quantity);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?
        } else {
            let now = Utc::now();
            cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?
        };

        txn.commit().await?;

        self.events
            .send_or_log(Event::CartItemAdded {
                user_id,
                product_id,
            })
            .await;

        Ok(saved)
    }

    /// Sets the quantity of an existing line. Zero or negative removes the
    /// line instead of storing a zero quantity.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        if quantity <= 0 {
            return self.remove_item(user_id, product_id).await;
        }

        let item = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} is not in the cart", product_id))
            })?;

        let mut item: cart_item::ActiveModel = item.into();
        item.quantity = Set(quantity);
        item.updated_at = Set(Utc::now());
        item.update(&*self.db).await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> Result<(), ServiceError> {
        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    /// Removes every line from the user's cart.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError> {
        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;

        self.events.send_or_log(Event::CartCleared(user_id)).await;
        info!(%user_id, "Cleared cart");
        Ok(())
    }

    /// Folds an anonymous session cart into the persisted cart, summing
    /// quantities where lines overlap. Lines with non-positive quantities or
    /// unknown/delisted products are skipped, not errors: the merge happens
    /// at sign-in and must not block it. Returns the number of lines merged.
    #[instrument(skip(self, lines), fields(count = lines.len()))]
    pub async fn merge(&self, user_id: Uuid, lines: &[SessionLine]) -> Result<usize, ServiceError> {
        let txn = self.db.begin().await?;
        let mut merged = 0usize;

        for line in lines {
            if line.quantity <= 0 {
                continue;
            }

            let product = Product::find_by_id(line.product_id).one(&txn).await?;
            let Some(product) = product else {
                warn!(product_id = %line.product_id, "skipping unknown product during cart merge");
                continue;
            };
            if !product.active {
                warn!(product_id = %product.id, "skipping delisted product during cart merge");
                continue;
            }

            let existing = CartItem::find()
                .filter(cart_item::Column::UserId.eq(user_id))
                .filter(cart_item::Column::ProductId.eq(line.product_id))
                .one(&txn)
                .await?;

            if let Some(item) = existing {
                let current = item.quantity;
                let mut item: cart_item::ActiveModel = item.into();
                item.quantity = Set(current + line.quantity);
                item.updated_at = Set(Utc::now());
                item.update(&txn).await?;
            } else {
                let now = Utc::now();
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    product_id: Set(line.product_id),
                    quantity: Set(line.quantity),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?;
            }
            merged += 1;
        }

        txn.commit().await?;

        self.events
            .send_or_log(Event::CartMerged {
                user_id,
                line_count: merged,
            })
            .await;

        Ok(merged)
    }
}
