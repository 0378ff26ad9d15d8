use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    entities::{
        address, cart_item, order, order_item, order::OrderStatus, CartItem, Order, OrderItem,
    },
    errors::ServiceError,
    events::{Event, EventSender, OrderSummary},
    services::tax::TaxService,
};

/// Rounds a money amount to 2 decimal places, half away from zero.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts a rounded money amount to minor units (cents) for the payment
/// gateway payload.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    let cents = round2(amount) * Decimal::from(100);
    cents
        .to_i64()
        .ok_or_else(|| ServiceError::IntegrityError(format!("amount {} out of range", amount)))
}

/// The money triple frozen onto an order at creation time.
///
/// Arithmetic stays exact until the snapshot: the subtotal and tax are each
/// rounded once, and the total is defined as their sum, so the persisted
/// triple always balances to the cent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    pub fn compute(exact_subtotal: Decimal, tax_rate: Decimal) -> Self {
        let subtotal = round2(exact_subtotal);
        let tax = round2(exact_subtotal * tax_rate);
        Self {
            subtotal,
            tax,
            total: subtotal + tax,
        }
    }
}

/// Checkout form input. The region is a name matched against the regions
/// table, not a free-form tax rate.
#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct CheckoutInput {
    #[validate(length(min = 1, max = 120))]
    pub shipping_name: String,
    #[validate(length(min = 1, max = 255))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub city: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    pub region: String,
}

impl CheckoutInput {
    fn formatted_address(&self) -> String {
        let mut parts = vec![self.line1.clone()];
        if let Some(line2) = &self.line2 {
            if !line2.trim().is_empty() {
                parts.push(line2.clone());
            }
        }
        parts.push(self.city.clone());
        parts.push(self.region.clone());
        parts.push(self.postal_code.clone());
        parts.join(", ")
    }
}

/// Totals preview for the checkout form, computed from the live cart without
/// creating anything.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CheckoutQuote {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub tax_rate: Decimal,
    pub line_count: usize,
}

/// Post-commit side effects of order creation. Hooks run after the
/// transaction commits; a failing hook is logged and never unwinds the
/// committed order.
#[async_trait]
pub trait OrderHook: Send + Sync {
    fn name(&self) -> &'static str;
    async fn after_create(&self, order: &order::Model, summary: &OrderSummary)
        -> Result<(), ServiceError>;
}

/// Default hook: publish the created order onto the event channel.
pub struct EventOrderHook {
    events: EventSender,
}

impl EventOrderHook {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }
}

#[async_trait]
impl OrderHook for EventOrderHook {
    fn name(&self) -> &'static str {
        "event-channel"
    }

    async fn after_create(
        &self,
        _order: &order::Model,
        summary: &OrderSummary,
    ) -> Result<(), ServiceError> {
        self.events
            .send_or_log(Event::OrderCreated(summary.clone()))
            .await;
        Ok(())
    }
}

/// Builds orders from carts and serves the order read side.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    tax: TaxService,
    hooks: Arc<Vec<Arc<dyn OrderHook>>>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, tax: TaxService, hooks: Vec<Arc<dyn OrderHook>>) -> Self {
        Self {
            db,
            tax,
            hooks: Arc::new(hooks),
        }
    }

    /// Creates a pending order from the user's cart in one transaction:
    /// validates the cart and region, snapshots each cart line into an order
    /// item at the product's current name and price, freezes the totals,
    /// stores the shipping address, and clears the cart. Any failure rolls
    /// the whole thing back, cart included.
    #[instrument(skip(self, user, input), fields(user_id = %user.id))]
    pub async fn create_from_cart(
        &self,
        user: &AuthUser,
        input: CheckoutInput,
    ) -> Result<order::Model, ServiceError> {
        input.validate()?;

        // Empty cart is reported before any region validation.
        let cart_count = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user.id))
            .count(&*self.db)
            .await?;
        if cart_count == 0 {
            return Err(ServiceError::EmptyCart);
        }

        let region = self.tax.resolve(&input.region).await?;

        let txn = self.db.begin().await?;

        let lines = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .find_also_related(crate::entities::Product)
            .all(&txn)
            .await?;

        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let mut exact_subtotal = Decimal::ZERO;
        let mut snapshots = Vec::with_capacity(lines.len());
        for (item, product) in &lines {
            let product = product
                .as_ref()
                .filter(|p| p.active)
                .ok_or(ServiceError::ProductUnavailable(item.product_id))?;
            exact_subtotal += product.price * Decimal::from(item.quantity);
            snapshots.push((item.clone(), product.clone()));
        }

        let totals = OrderTotals::compute(exact_subtotal, region.rate());
        let now = Utc::now();

        let address = address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.id),
            name: Set(Some(input.shipping_name.clone())),
            line1: Set(input.line1.clone()),
            line2: Set(input.line2.clone()),
            city: Set(input.city.clone()),
            postal_code: Set(input.postal_code.clone()),
            region_id: Set(region.id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.id),
            address_id: Set(address.id),
            shipping_name: Set(input.shipping_name.clone()),
            shipping_address: Set(input.formatted_address()),
            region: Set(region.name.clone()),
            subtotal: Set(totals.subtotal),
            tax: Set(totals.tax),
            total: Set(totals.total),
            status: Set(OrderStatus::Pending),
            payment_session_id: Set(None),
            payment_transaction_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut item_sum = Decimal::ZERO;
        let mut item_lines = Vec::with_capacity(snapshots.len());
        for (cart_line, product) in &snapshots {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(product.id),
                product_name: Set(product.name.clone()),
                quantity: Set(cart_line.quantity),
                unit_price: Set(product.price),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;

            item_sum += product.price * Decimal::from(cart_line.quantity);
            item_lines.push(format!("{} x{}", product.name, cart_line.quantity));
        }

        // Totals are frozen from the same rows we snapshot, so a mismatch
        // here means a concurrent price change slipped in. Abort.
        if round2(item_sum) != order.subtotal {
            return Err(ServiceError::IntegrityError(format!(
                "order item sum {} does not match subtotal {}",
                item_sum, order.subtotal
            )));
        }

        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user.id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        info!(order_id = %order.id, total = %order.total, "Order created");

        let summary = OrderSummary {
            order_id: order.id,
            total: order.total,
            customer: user.email.clone(),
            item_lines,
        };
        for hook in self.hooks.iter() {
            if let Err(e) = hook.after_create(&order, &summary).await {
                error!(order_id = %order.id, hook = hook.name(), "order hook failed: {}", e);
            }
        }

        Ok(order)
    }

    /// Totals preview against the current cart. Uses the fail-open rate
    /// lookup, so an unknown region quotes zero tax rather than erroring.
    #[instrument(skip(self))]
    pub async fn quote(
        &self,
        user_id: Uuid,
        region_name: &str,
    ) -> Result<CheckoutQuote, ServiceError> {
        let lines = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .find_also_related(crate::entities::Product)
            .all(&*self.db)
            .await?;

        let mut exact_subtotal = Decimal::ZERO;
        let mut line_count = 0usize;
        for (item, product) in &lines {
            if let Some(product) = product {
                exact_subtotal += product.price * Decimal::from(item.quantity);
                line_count += 1;
            }
        }

        let rate = self.tax.rate_for(region_name).await?;
        let totals = OrderTotals::compute(exact_subtotal, rate);

        Ok(CheckoutQuote {
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
            tax_rate: rate,
            line_count,
        })
    }

    /// Fetches an order scoped to its owner.
    pub async fn get_order_for_user(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        Order::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    pub async fn get_order_with_items(
        &self,
        order_id: Uuid,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok((order, items))
    }

    /// The user's orders, newest first.
    pub async fn list_orders_for_user(
        &self,
        user_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let paginator = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Admin listing with an optional status filter.
    pub async fn list_orders_admin(
        &self,
        status: Option<OrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = Order::find().order_by_desc(order::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }
        let paginator = query.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Looks an order up by the payment session id the gateway echoes back.
    pub async fn find_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::PaymentSessionId.eq(session_id))
            .one(&*self.db)
            .await?)
    }

    /// Records the gateway session id on a pending order.
    pub async fn set_payment_session(
        &self,
        order_id: Uuid,
        session_id: &str,
    ) -> Result<order::Model, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let mut active: order::ActiveModel = order.into();
        active.payment_session_id = Set(Some(session_id.to_string()));
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn totals_round_once_and_balance() {
        let totals = OrderTotals::compute(dec!(20.00), dec!(0.13));
        assert_eq!(totals.subtotal, dec!(20.00));
        assert_eq!(totals.tax, dec!(2.60));
        assert_eq!(totals.total, dec!(22.60));
    }

    #[test]
    fn totals_balance_even_when_tax_rounds() {
        // 19.99 * 0.13 = 2.5987, rounds to 2.60
        let totals = OrderTotals::compute(dec!(19.99), dec!(0.13));
        assert_eq!(totals.tax, dec!(2.60));
        assert_eq!(totals.total, totals.subtotal + totals.tax);
    }

    #[test]
    fn half_cent_rounds_away_from_zero() {
        // 2.345 -> 2.35 under half-up, not banker's 2.34
        let totals = OrderTotals::compute(dec!(23.45), dec!(0.1));
        assert_eq!(totals.tax, dec!(2.35));
    }

    #[test]
    fn zero_rate_quotes_no_tax() {
        let totals = OrderTotals::compute(dec!(15.50), Decimal::ZERO);
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.total, dec!(15.50));
    }

    #[test]
    fn minor_units_conversion() {
        assert_eq!(to_minor_units(dec!(22.60)).unwrap(), 2260);
        assert_eq!(to_minor_units(dec!(0.01)).unwrap(), 1);
        assert_eq!(to_minor_units(Decimal::ZERO).unwrap(), 0);
    }

    #[test]
    fn formatted_address_skips_blank_line2() {
        let input = CheckoutInput {
            shipping_name: "Ada".to_string(),
            line1: "1 Main St".to_string(),
            line2: Some("  ".to_string()),
            city: "Toronto".to_string(),
            postal_code: "M5V 1A1".to_string(),
            region: "Ontario".to_string(),
        };
        assert_eq!(input.formatted_address(), "1 Main St, Toronto, Ontario, M5V 1A1");
    }
}
