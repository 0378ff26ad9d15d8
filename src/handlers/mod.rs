pub mod admin;
pub mod carts;
pub mod checkout;
pub mod orders;
pub mod payment_webhooks;
pub mod products;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    events::EventSender,
    services::{
        carts::CartService,
        order_status::{OrderStatusService, TransitionPolicy},
        orders::{EventOrderHook, OrderHook, OrderService},
        payments::PaymentGateway,
        products::ProductCatalogService,
        receipts::{PlainReceiptRenderer, ReceiptRenderer},
        tax::TaxService,
        webhooks::WebhookReconciler,
    },
};

pub use crate::AppState;

/// The wired service layer handed to HTTP handlers through `AppState`.
#[derive(Clone)]
pub struct AppServices {
    pub products: ProductCatalogService,
    pub carts: CartService,
    pub tax: TaxService,
    pub orders: OrderService,
    pub order_status: OrderStatusService,
    pub payments: PaymentGateway,
    pub webhooks: WebhookReconciler,
    pub receipts: Arc<dyn ReceiptRenderer>,
}

impl AppServices {
    pub fn build(
        db: Arc<DbPool>,
        config: &AppConfig,
        event_sender: EventSender,
    ) -> Result<Self, ServiceError> {
        let tax = TaxService::new(db.clone());
        let hooks: Vec<Arc<dyn OrderHook>> =
            vec![Arc::new(EventOrderHook::new(event_sender.clone()))];
        let orders = OrderService::new(db.clone(), tax.clone(), hooks);
        let order_status = OrderStatusService::new(
            db.clone(),
            event_sender.clone(),
            TransitionPolicy::from_strict_flag(config.strict_status_sequencing),
        );
        let payments = PaymentGateway::new(config.payment.clone())?;
        let webhooks = WebhookReconciler::new(
            orders.clone(),
            order_status.clone(),
            config.payment.webhook_secret.clone(),
            config.payment.webhook_tolerance_secs,
        );

        Ok(Self {
            products: ProductCatalogService::new(db.clone()),
            carts: CartService::new(db.clone(), event_sender),
            tax,
            orders,
            order_status,
            payments,
            webhooks,
            receipts: Arc::new(PlainReceiptRenderer),
        })
    }
}
