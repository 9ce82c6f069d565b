use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::gateway::GatewayError;

/// JSON error payload returned by every failing endpoint.
///
/// `error` is a stable machine-readable code; `message` is for humans and
/// `details` carries code-specific context (e.g. the missing product ids).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "insufficient_stock",
    "message": "Insufficient stock for product 550e8400-e29b-41d4-a716-446655440000",
    "details": { "available": 5 },
    "timestamp": "2025-03-01T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unknown products in cart")]
    InvalidProducts { missing: Vec<Uuid> },

    #[error("Insufficient stock for product {product_id}")]
    InsufficientStock { product_id: Uuid, available: i32 },

    #[error("Invalid or inactive coupon: {0}")]
    InvalidCoupon(String),

    #[error("Could not determine store from hostname")]
    StoreNotIdentified,

    #[error("Unknown store subdomain: {0}")]
    StoreNotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Webhook payload carries no billing id")]
    MissingBillingId,

    #[error("Store not found or not configured for webhooks")]
    StoreNotConfigured,

    #[error("Payment gateway failure: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::StoreNotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::InvalidProducts { .. }
            | Self::InsufficientStock { .. }
            | Self::InvalidCoupon(_)
            | Self::StoreNotIdentified
            | Self::MissingBillingId
            | Self::InvalidOperation(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) | Self::InvalidSignature | Self::StoreNotConfigured => {
                StatusCode::UNAUTHORIZED
            }
            Self::DatabaseError(_) | Self::Gateway(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::InvalidProducts { .. } => "invalid_products",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::InvalidCoupon(_) => "invalid_coupon",
            Self::StoreNotIdentified => "store_not_identified",
            Self::StoreNotFound(_) => "store_not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidSignature => "invalid_signature",
            Self::MissingBillingId => "no_billing_id",
            Self::StoreNotConfigured => "store_not_found_or_not_configured",
            Self::Gateway(_) => "gateway_failed",
            Self::InvalidOperation(_) => "invalid_operation",
            Self::BadRequest(_) => "bad_request",
            Self::InternalError(_) | Self::Other(_) => "internal_error",
        }
    }

    /// Code-specific context attached under `details`.
    fn details(&self) -> Option<Value> {
        match self {
            Self::InvalidProducts { missing } => Some(json!({ "missing": missing })),
            Self::InsufficientStock {
                product_id,
                available,
            } => Some(json!({ "productId": product_id, "available": available })),
            Self::Gateway(err) => Some(json!({
                "upstreamStatus": err.status(),
                "upstreamBody": err.body(),
            })),
            _ => None,
        }
    }

    /// Message suitable for HTTP responses. Internal errors return a
    /// generic message so implementation details never leak to clients.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: self.code().to_string(),
            message: self.response_message(),
            details: self.details(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::InvalidProducts { missing: vec![] }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::InsufficientStock {
                product_id: Uuid::new_v4(),
                available: 2
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::InvalidSignature.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::StoreNotConfigured.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::MissingBillingId.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Gateway(GatewayError::upstream(Some(502), "bad gateway".into()))
                .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_messages_stay_generic() {
        assert_eq!(
            ServiceError::InternalError("connection pool exhausted".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::InvalidCoupon("WELCOME10".into()).response_message(),
            "Invalid or inactive coupon: WELCOME10"
        );
    }

    #[tokio::test]
    async fn insufficient_stock_response_carries_details() {
        let product_id = Uuid::new_v4();
        let response = ServiceError::InsufficientStock {
            product_id,
            available: 5,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.error, "insufficient_stock");
        let details = payload.details.expect("details expected");
        assert_eq!(details["available"], 5);
        assert_eq!(details["productId"], product_id.to_string());
    }
}
