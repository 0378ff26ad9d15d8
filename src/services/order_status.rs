use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{order, order_item, order::OrderStatus, Order, OrderItem},
    errors::ServiceError,
    events::{Event, EventSender, OrderSummary},
};

/// Which forward moves the lifecycle accepts.
///
/// `Permissive` matches the observed behavior of the admin surface: any jump
/// from a non-terminal state to a later state is accepted (pending straight
/// to shipped is fine). `StrictSequential` only accepts single forward steps
/// along pending, paid, processing, shipped, delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPolicy {
    Permissive,
    StrictSequential,
}

impl TransitionPolicy {
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict {
            Self::StrictSequential
        } else {
            Self::Permissive
        }
    }

    /// Whether `from -> to` is an acceptable move. Same-status moves are
    /// handled upstream as no-ops and never reach this check.
    fn allows(&self, from: OrderStatus, to: OrderStatus) -> bool {
        if from.is_terminal() {
            return false;
        }
        if to == OrderStatus::Cancelled {
            return true;
        }
        if to == OrderStatus::Pending {
            return false;
        }
        match (from.sequence_index(), to.sequence_index()) {
            (Some(f), Some(t)) => match self {
                Self::Permissive => t > f,
                Self::StrictSequential => t == f + 1,
            },
            _ => false,
        }
    }
}

/// The single gatekeeper for order status changes. Every mutation of
/// `orders.status` in the system goes through `transition`.
#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    events: EventSender,
    policy: TransitionPolicy,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>, events: EventSender, policy: TransitionPolicy) -> Self {
        Self { db, events, policy }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Moves an order to `new_status` with check-and-set semantics inside one
    /// transaction.
    ///
    /// A transition to the order's current status is a successful no-op: the
    /// order is returned unchanged, no event fires, and an already-recorded
    /// payment transaction id is never overwritten. This is what makes
    /// webhook replays harmless.
    ///
    /// The write is conditional on the status the check read. A concurrent
    /// transition that lands first leaves nothing for this one to update, so
    /// the loser degrades into a replay instead of clobbering the winner's
    /// transaction id or firing a second event.
    #[instrument(skip(self, payment_transaction_id))]
    pub async fn transition(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        payment_transaction_id: Option<&str>,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;
        if old_status == new_status {
            txn.commit().await?;
            info!(%order_id, status = %new_status, "Transition is a no-op");
            return Ok(order);
        }

        if !self.policy.allows(old_status, new_status) {
            return Err(ServiceError::InvalidTransition {
                from: old_status.to_string(),
                to: new_status.to_string(),
            });
        }

        let mut update = Order::update_many()
            .col_expr(order::Column::Status, Expr::value(new_status))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(old_status));
        if new_status == OrderStatus::Paid {
            if let Some(txn_id) = payment_transaction_id {
                update = update.col_expr(
                    order::Column::PaymentTransactionId,
                    Expr::value(txn_id.to_string()),
                );
            }
        }
        let result = update.exec(&txn).await?;

        if result.rows_affected == 0 {
            // A concurrent transition moved the order between our read and
            // write. Hand back the current row unchanged.
            let current = Order::find_by_id(order_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
            txn.commit().await?;
            info!(%order_id, status = %current.status, "Transition raced and lost, treating as replay");
            return Ok(current);
        }

        let updated = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        txn.commit().await?;

        info!(%order_id, %old_status, %new_status, "Order status changed");

        self.events
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            })
            .await;

        if new_status == OrderStatus::Paid {
            match self.summarize(&updated).await {
                Ok(summary) => self.events.send_or_log(Event::OrderPaid(summary)).await,
                Err(e) => warn!(%order_id, "could not summarize paid order: {}", e),
            }
        }

        Ok(updated)
    }

    /// Marks an order paid, recording the payment transaction id. Replays
    /// reduce to the no-op branch of `transition`, so the first recorded id
    /// wins.
    pub async fn mark_paid(
        &self,
        order_id: Uuid,
        payment_transaction_id: &str,
    ) -> Result<order::Model, ServiceError> {
        self.transition(order_id, OrderStatus::Paid, Some(payment_transaction_id))
            .await
    }

    async fn summarize(&self, order: &order::Model) -> Result<OrderSummary, ServiceError> {
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(OrderSummary {
            order_id: order.id,
            total: order.total,
            customer: order.shipping_name.clone(),
            item_lines: items
                .iter()
                .map(|i| format!("{} x{}", i.product_name, i.quantity))
                .collect(),
        })
    }
}
