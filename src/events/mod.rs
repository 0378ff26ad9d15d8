use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use crate::entities::order::OrderStatus;
use crate::services::notifications::Notifier;

/// Compact order summary carried by order events, assembled at commit time so
/// downstream consumers never re-read mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: Uuid,
    pub total: Decimal,
    /// Customer email where known, shipping name otherwise.
    pub customer: String,
    /// One "Name xQty" line per order item.
    pub item_lines: Vec<String>,
}

/// Events emitted by the services after successful commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(OrderSummary),
    OrderPaid(OrderSummary),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    CartItemAdded {
        user_id: Uuid,
        product_id: Uuid,
    },
    CartCleared(Uuid),
    CartMerged {
        user_id: Uuid,
        line_count: usize,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing channel failure to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event and logs failures instead of returning them. Used after
    /// commits, where a full channel must never fail the committed operation.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            error!("Dropping event: {}", e);
        }
    }
}

/// Consumes events and dispatches side effects. Notification delivery is
/// best-effort: the notifier swallows its own errors, so a dead chat webhook
/// never backs up this loop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, notifier: Option<Arc<Notifier>>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated(summary) => {
                info!(order_id = %summary.order_id, "Order created");
                if let Some(notifier) = &notifier {
                    notifier.order_created(summary).await;
                }
            }
            Event::OrderPaid(summary) => {
                info!(order_id = %summary.order_id, "Order paid");
                if let Some(notifier) = &notifier {
                    notifier.order_paid(summary).await;
                }
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(%order_id, %old_status, %new_status, "Order status changed");
            }
            other => {
                info!("Event: {:?}", other);
            }
        }
    }

    info!("Event processing loop stopped");
}
