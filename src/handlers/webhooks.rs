use axum::{
    extract::State, http::HeaderMap, response::IntoResponse, routing::post, Json, Router,
};
use bytes::Bytes;
use serde_json::json;
use tracing::debug;

use crate::{errors::ServiceError, AppState};

/// Header carrying the provider's HMAC signature over the raw body.
const SIGNATURE_HEADER: &str = "x-abacate-signature";

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/abacatepay", post(abacatepay_webhook))
}

/// Payment-provider callback. Signature-verified against the raw bytes
/// with the owning store's secret; duplicate and irrelevant events are
/// acknowledged with success so the provider stops redelivering.
#[utoipa::path(
    post,
    path = "/webhooks/abacatepay",
    request_body = String,
    responses(
        (status = 200, description = "Event processed or acknowledged as a no-op"),
        (status = 400, description = "Missing billing id or malformed payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid signature", body = crate::errors::ErrorResponse)
    ),
    tag = "Webhooks"
)]
pub async fn abacatepay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state.services.settlement.process(&body, signature).await?;
    debug!(?outcome, "webhook processed");

    Ok(Json(json!({ "ok": true })))
}
