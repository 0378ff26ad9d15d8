use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::entities::{order, order_item};

/// Flattened order view handed to a renderer. Assembled once from the frozen
/// order snapshot; renderers never touch the database.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub order_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub shipping_name: String,
    pub shipping_address: String,
    pub region: String,
    pub lines: Vec<ReceiptLine>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    /// Set for orders that have not been paid yet. A pro-forma receipt is a
    /// preview of the charge, not proof of payment.
    pub pro_forma: bool,
}

#[derive(Debug, Clone)]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl Receipt {
    pub fn from_order(order: &order::Model, items: &[order_item::Model]) -> Self {
        Self {
            order_id: order.id,
            issued_at: order.created_at,
            shipping_name: order.shipping_name.clone(),
            shipping_address: order.shipping_address.clone(),
            region: order.region.clone(),
            lines: items
                .iter()
                .map(|item| ReceiptLine {
                    name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    line_total: item.line_total(),
                })
                .collect(),
            subtotal: order.subtotal,
            tax: order.tax,
            total: order.total,
            pro_forma: order.status == order::OrderStatus::Pending,
        }
    }
}

/// Rendering boundary. The document generator is a pure function of the
/// receipt; swapping in a typeset PDF renderer touches nothing else.
pub trait ReceiptRenderer: Send + Sync {
    fn render(&self, receipt: &Receipt) -> Vec<u8>;
    fn content_type(&self) -> &'static str;
    fn file_name(&self, receipt: &Receipt) -> String;
}

/// Default renderer: a fixed-width plain-text document.
pub struct PlainReceiptRenderer;

impl ReceiptRenderer for PlainReceiptRenderer {
    fn render(&self, receipt: &Receipt) -> Vec<u8> {
        let mut out = String::new();
        let title = if receipt.pro_forma {
            "PRO FORMA RECEIPT"
        } else {
            "RECEIPT"
        };
        out.push_str(&format!("{}\n", title));
        out.push_str(&format!("Order {}\n", receipt.order_id));
        out.push_str(&format!(
            "Issued {}\n",
            receipt.issued_at.format("%Y-%m-%d %H:%M UTC")
        ));
        out.push_str(&format!(
            "\nShip to: {}\n{}\n\n",
            receipt.shipping_name, receipt.shipping_address
        ));

        for line in &receipt.lines {
            out.push_str(&format!(
                "{:<40} {:>3} x {:>10} = {:>10}\n",
                line.name, line.quantity, line.unit_price, line.line_total
            ));
        }

        out.push_str(&format!("\n{:>58} {:>10}\n", "Subtotal:", receipt.subtotal));
        out.push_str(&format!(
            "{:>58} {:>10}\n",
            format!("Tax ({}):", receipt.region),
            receipt.tax
        ));
        out.push_str(&format!("{:>58} {:>10}\n", "Total:", receipt.total));
        out.into_bytes()
    }

    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn file_name(&self, receipt: &Receipt) -> String {
        if receipt.pro_forma {
            format!("quote-{}.txt", receipt.order_id)
        } else {
            format!("receipt-{}.txt", receipt.order_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::order::OrderStatus;
    use rust_decimal_macros::dec;

    fn sample_receipt() -> Receipt {
        let now = Utc::now();
        let order = order::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            address_id: Uuid::new_v4(),
            shipping_name: "Ada".to_string(),
            shipping_address: "1 Main St, Toronto, Ontario, M5V 1A1".to_string(),
            region: "Ontario".to_string(),
            subtotal: dec!(20.00),
            tax: dec!(2.60),
            total: dec!(22.60),
            status: OrderStatus::Paid,
            payment_session_id: None,
            payment_transaction_id: Some("pi_123".to_string()),
            created_at: now,
            updated_at: now,
        };
        let items = vec![order_item::Model {
            id: Uuid::new_v4(),
            order_id: order.id,
            product_id: Uuid::new_v4(),
            product_name: "Maple Mug".to_string(),
            quantity: 2,
            unit_price: dec!(10.00),
            created_at: now,
        }];
        Receipt::from_order(&order, &items)
    }

    #[test]
    fn receipt_carries_the_frozen_totals() {
        let receipt = sample_receipt();
        assert_eq!(receipt.subtotal, dec!(20.00));
        assert_eq!(receipt.tax, dec!(2.60));
        assert_eq!(receipt.total, dec!(22.60));
        assert_eq!(receipt.lines[0].line_total, dec!(20.00));
    }

    #[test]
    fn plain_renderer_includes_items_and_totals() {
        let receipt = sample_receipt();
        let bytes = PlainReceiptRenderer.render(&receipt);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("RECEIPT"));
        assert!(text.contains("Maple Mug"));
        assert!(text.contains("22.60"));
        assert!(text.contains("Ontario"));
    }

    #[test]
    fn pro_forma_is_labelled() {
        let mut receipt = sample_receipt();
        receipt.pro_forma = true;
        let text = String::from_utf8(PlainReceiptRenderer.render(&receipt)).unwrap();
        assert!(text.starts_with("PRO FORMA"));
        assert!(PlainReceiptRenderer.file_name(&receipt).starts_with("quote-"));
    }

    #[test]
    fn unpaid_orders_get_pro_forma_receipts() {
        let now = Utc::now();
        let order = order::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            address_id: Uuid::new_v4(),
            shipping_name: "Ada".to_string(),
            shipping_address: "1 Main St, Toronto, Ontario, M5V 1A1".to_string(),
            region: "Ontario".to_string(),
            subtotal: dec!(20.00),
            tax: dec!(2.60),
            total: dec!(22.60),
            status: OrderStatus::Pending,
            payment_session_id: None,
            payment_transaction_id: None,
            created_at: now,
            updated_at: now,
        };
        let receipt = Receipt::from_order(&order, &[]);
        assert!(receipt.pro_forma);
    }
}
