pub mod carts;
pub mod notifications;
pub mod order_status;
pub mod orders;
pub mod payments;
pub mod products;
pub mod receipts;
pub mod tax;
pub mod webhooks;
