use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, instrument};

use crate::{
    config::PaymentConfig,
    entities::{order, order_item},
    errors::ServiceError,
    services::orders::to_minor_units,
};

/// A hosted checkout session returned by the gateway. The shopper is
/// redirected to `url`; `id` is stored on the order so the completion webhook
/// can find it even without metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
struct SessionLineItem {
    name: String,
    unit_amount: i64,
    quantity: i64,
    currency: &'static str,
}

#[derive(Debug, Serialize)]
struct SessionMetadata {
    order_id: String,
}

#[derive(Debug, Serialize)]
struct CreateSessionRequest {
    mode: &'static str,
    line_items: Vec<SessionLineItem>,
    success_url: String,
    cancel_url: String,
    customer_email: Option<String>,
    metadata: SessionMetadata,
}

/// Client for the gateway's session-creation API. All calls happen outside
/// database transactions with a bounded timeout; an order is always committed
/// before the first call for it.
#[derive(Clone)]
pub struct PaymentGateway {
    client: Client,
    config: PaymentConfig,
}

impl PaymentGateway {
    pub fn new(config: PaymentConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!("payment client construction failed: {}", e))
            })?;
        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.gateway_url.is_some() && self.config.api_key.is_some()
    }

    /// Creates a hosted checkout session for a pending order: one line per
    /// order item at the snapshotted unit price, plus a single synthetic
    /// "Tax" line when the order carries tax.
    #[instrument(skip(self, order, items), fields(order_id = %order.id))]
    pub async fn create_session(
        &self,
        order: &order::Model,
        items: &[order_item::Model],
        customer_email: Option<String>,
    ) -> Result<GatewaySession, ServiceError> {
        let (gateway_url, api_key) = match (&self.config.gateway_url, &self.config.api_key) {
            (Some(url), Some(key)) => (url, key),
            _ => {
                return Err(ServiceError::PaymentGatewayError(
                    "payment gateway is not configured".to_string(),
                ))
            }
        };

        let request = CreateSessionRequest {
            mode: "payment",
            line_items: build_line_items(order, items)?,
            success_url: format!(
                "{}?session_id={{CHECKOUT_SESSION_ID}}",
                self.config.success_url
            ),
            cancel_url: self.config.cancel_url.clone(),
            customer_email,
            metadata: SessionMetadata {
                order_id: order.id.to_string(),
            },
        };

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", gateway_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("gateway session request failed: {}", e);
                ServiceError::PaymentGatewayError(format!("session request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, "gateway rejected session creation: {}", body);
            return Err(ServiceError::PaymentGatewayError(format!(
                "gateway returned {}",
                status
            )));
        }

        let session: GatewaySession = response.json().await.map_err(|e| {
            ServiceError::PaymentGatewayError(format!("malformed session response: {}", e))
        })?;

        info!(session_id = %session.id, "Created payment session");
        Ok(session)
    }
}

fn build_line_items(
    order: &order::Model,
    items: &[order_item::Model],
) -> Result<Vec<SessionLineItem>, ServiceError> {
    let mut lines = Vec::with_capacity(items.len() + 1);
    for item in items {
        lines.push(SessionLineItem {
            name: item.product_name.clone(),
            unit_amount: to_minor_units(item.unit_price)?,
            quantity: i64::from(item.quantity),
            currency: "cad",
        });
    }
    if order.tax > rust_decimal::Decimal::ZERO {
        lines.push(SessionLineItem {
            name: "Tax".to_string(),
            unit_amount: to_minor_units(order.tax)?,
            quantity: 1,
            currency: "cad",
        });
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::order::OrderStatus;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn order_with(tax: rust_decimal::Decimal) -> order::Model {
        let now = Utc::now();
        order::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            address_id: Uuid::new_v4(),
            shipping_name: "Ada".to_string(),
            shipping_address: "1 Main St, Toronto, Ontario, M5V 1A1".to_string(),
            region: "Ontario".to_string(),
            subtotal: dec!(20.00),
            tax,
            total: dec!(20.00) + tax,
            status: OrderStatus::Pending,
            payment_session_id: None,
            payment_transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(name: &str, price: rust_decimal::Decimal, qty: i32) -> order_item::Model {
        order_item::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: name.to_string(),
            quantity: qty,
            unit_price: price,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn line_items_are_in_cents_with_tax_line() {
        let order = order_with(dec!(2.60));
        let items = vec![item("Maple Mug", dec!(7.50), 2), item("Toque", dec!(5.00), 1)];
        let lines = build_line_items(&order, &items).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].unit_amount, 750);
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(lines[2].name, "Tax");
        assert_eq!(lines[2].unit_amount, 260);
        assert_eq!(lines[2].quantity, 1);
    }

    #[test]
    fn no_tax_line_when_tax_is_zero() {
        let order = order_with(rust_decimal::Decimal::ZERO);
        let items = vec![item("Maple Mug", dec!(7.50), 2)];
        let lines = build_line_items(&order, &items).unwrap();
        assert_eq!(lines.len(), 1);
    }
}
