use chrono::Utc;
use hmac::{Hmac, Mac};
use http::HeaderMap;
use serde::Deserialize;
use sha2::Sha256;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    services::{order_status::OrderStatusService, orders::OrderService},
};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Gateway-Signature";
const COMPLETED_EVENT: &str = "checkout.session.completed";

/// Outcome of a webhook delivery. Both variants are acked with 200: the
/// gateway retries on anything else, and an event we cannot match is not
/// going to match better next time.
#[derive(Debug, PartialEq, Eq)]
pub enum WebhookAck {
    /// The named order was reconciled (or the delivery was a harmless replay).
    Processed(Uuid),
    /// Recognized but irrelevant, or unmatched. Logged and dropped.
    Ignored,
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: SessionObject,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    metadata: Option<SessionMetadata>,
}

#[derive(Debug, Deserialize)]
struct SessionMetadata {
    #[serde(default)]
    order_id: Option<String>,
}

/// Reconciles gateway completion webhooks against pending orders.
///
/// Verification happens over the raw body before any parsing. The
/// idempotence guard is the order status itself: a replayed completion
/// reduces to a no-op transition, so no delivery ledger is kept.
#[derive(Clone)]
pub struct WebhookReconciler {
    orders: OrderService,
    status: OrderStatusService,
    secret: Option<String>,
    tolerance_secs: u64,
}

impl WebhookReconciler {
    pub fn new(
        orders: OrderService,
        status: OrderStatusService,
        secret: Option<String>,
        tolerance_secs: u64,
    ) -> Self {
        Self {
            orders,
            status,
            secret,
            tolerance_secs,
        }
    }

    #[instrument(skip(self, headers, payload))]
    pub async fn handle(
        &self,
        headers: &HeaderMap,
        payload: &[u8],
    ) -> Result<WebhookAck, ServiceError> {
        if let Some(secret) = &self.secret {
            let header = headers
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    ServiceError::Unauthorized("missing webhook signature".to_string())
                })?;
            verify_signature(secret, header, payload, self.tolerance_secs)?;
        }

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| ServiceError::BadRequest(format!("malformed webhook payload: {}", e)))?;

        if event.event_type != COMPLETED_EVENT {
            info!(event_type = %event.event_type, "Ignoring webhook event type");
            return Ok(WebhookAck::Ignored);
        }

        let session = event.data.object;
        if session.payment_status.as_deref() != Some("paid") {
            info!(session_id = %session.id, "Completed session is not paid, ignoring");
            return Ok(WebhookAck::Ignored);
        }

        let order = self.resolve_order(&session).await?;
        let Some(order) = order else {
            warn!(session_id = %session.id, "No order matches webhook session");
            return Ok(WebhookAck::Ignored);
        };

        let txn_id = session.payment_intent.as_deref().unwrap_or(&session.id);
        // A completed session for an order that already moved to a terminal
        // state (refund, admin cancel) is acked, not bounced: a 4xx would
        // keep the gateway retrying a delivery that can never succeed.
        let updated = match self.status.mark_paid(order.id, txn_id).await {
            Ok(updated) => updated,
            Err(ServiceError::InvalidTransition { from, to }) => {
                warn!(order_id = %order.id, %from, %to, "Completed session conflicts with order state, ignoring");
                return Ok(WebhookAck::Ignored);
            }
            Err(e) => return Err(e),
        };

        info!(order_id = %updated.id, status = %updated.status, "Webhook reconciled");
        Ok(WebhookAck::Processed(updated.id))
    }

    /// Resolution order: `metadata.order_id` first, stored session id second.
    async fn resolve_order(
        &self,
        session: &SessionObject,
    ) -> Result<Option<crate::entities::order::Model>, ServiceError> {
        if let Some(order_id) = session
            .metadata
            .as_ref()
            .and_then(|m| m.order_id.as_deref())
            .and_then(|s| Uuid::parse_str(s).ok())
        {
            match self.orders.get_order_with_items(order_id).await {
                Ok((order, _)) => return Ok(Some(order)),
                Err(ServiceError::NotFound(_)) => {
                    warn!(%order_id, "webhook metadata names an unknown order");
                }
                Err(e) => return Err(e),
            }
        }
        self.orders.find_by_session_id(&session.id).await
    }
}

/// Signs a payload the way the gateway does: `t=<ts>,v1=<hex hmac>` over
/// `"{ts}.{payload}"`. Exposed for tests and local tooling.
pub fn signature_header(
    secret: &str,
    timestamp: i64,
    payload: &[u8],
) -> Result<String, ServiceError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ServiceError::InternalError("webhook secret unusable".to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    tolerance_secs: u64,
) -> Result<(), ServiceError> {
    let mut timestamp: Option<i64> = None;
    let mut candidate: Option<Vec<u8>> = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidate = hex::decode(value).ok(),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| ServiceError::Unauthorized("malformed webhook signature".to_string()))?;
    let candidate = candidate
        .ok_or_else(|| ServiceError::Unauthorized("malformed webhook signature".to_string()))?;

    let age = (Utc::now().timestamp() - timestamp).abs();
    if age > tolerance_secs as i64 {
        return Err(ServiceError::Unauthorized(
            "webhook timestamp outside tolerance".to_string(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ServiceError::InternalError("webhook secret unusable".to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    mac.verify_slice(&candidate)
        .map_err(|_| ServiceError::Unauthorized("webhook signature mismatch".to_string()))
}
