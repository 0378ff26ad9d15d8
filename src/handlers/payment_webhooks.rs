use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::info;

use crate::{errors::ServiceError, services::webhooks::WebhookAck, AppState};

/// POST /api/v1/payments/webhook
///
/// Unauthenticated endpoint; trust comes from the HMAC signature over the
/// raw body. Matched completions and harmless replays both ack with 200 so
/// the gateway stops retrying.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Delivery acknowledged"),
        (status = 400, description = "Malformed payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Bad or missing signature", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    match state.services.webhooks.handle(&headers, &body).await? {
        WebhookAck::Processed(order_id) => {
            info!(%order_id, "Webhook processed");
        }
        WebhookAck::Ignored => {}
    }
    Ok((StatusCode::OK, "ok"))
}
