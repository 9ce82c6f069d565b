//! Thin client for the AbacatePay billing API.
//!
//! Every call takes the tenant's API key explicitly: stores each carry
//! their own credential, so nothing provider-related is process-wide.
//! The client never retries; callers own retry/compensation policy.

use reqwest::Method;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx HTTP status or an API-level `error` field. Carries the
    /// upstream status/body for diagnostics.
    #[error("gateway error (status {status:?}): {body}")]
    Upstream { status: Option<u16>, body: String },
}

impl GatewayError {
    pub fn upstream(status: Option<u16>, body: String) -> Self {
        GatewayError::Upstream { status, body }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Transport(err) => err.status().map(|s| s.as_u16()),
            GatewayError::Upstream { status, .. } => *status,
        }
    }

    pub fn body(&self) -> String {
        match self {
            GatewayError::Transport(err) => err.to_string(),
            GatewayError::Upstream { body, .. } => body.clone(),
        }
    }
}

/// Responses arrive wrapped as `{ data, error }`; a non-null `error`
/// signals failure even on a 2xx status.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    data: Option<T>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    pub name: String,
    pub email: String,
    pub tax_id: String,
    pub cellphone: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerMetadata {
    pub name: String,
    pub email: String,
    pub tax_id: String,
    pub cellphone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    pub id: String,
    pub metadata: CustomerMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingProduct {
    pub external_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Integer cents; the provider requires at least 100.
    pub price: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBillingRequest {
    pub customer_id: String,
    pub products: Vec<BillingProduct>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupons: Option<Vec<String>>,
    pub allow_coupons: bool,
    pub return_url: String,
    pub completion_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Billing {
    pub id: String,
    pub url: Option<String>,
    pub status: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGatewayCouponRequest {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub max_redeems: i32,
    pub discount_kind: GatewayDiscountKind,
    pub discount: i64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayDiscountKind {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayCoupon {
    pub id: String,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct AbacatePayClient {
    http: reqwest::Client,
    base_url: String,
}

impl AbacatePayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// POST /customer/create
    #[instrument(skip(self, api_key, request), fields(email = %request.email))]
    pub async fn create_customer(
        &self,
        api_key: &str,
        request: &CreateCustomerRequest,
    ) -> Result<Customer, GatewayError> {
        self.call(api_key, Method::POST, "/customer/create", Some(json!(request)))
            .await
    }

    /// POST /billing/create
    #[instrument(skip(self, api_key, request), fields(customer_id = %request.customer_id))]
    pub async fn create_billing(
        &self,
        api_key: &str,
        request: &CreateBillingRequest,
    ) -> Result<Billing, GatewayError> {
        // One-time PIX charges only; the storefront has no recurring plans.
        let mut payload = serde_json::to_value(request).map_err(|e| {
            GatewayError::upstream(None, format!("billing payload serialization: {e}"))
        })?;
        payload["frequency"] = json!("ONE_TIME");
        payload["methods"] = json!(["PIX"]);
        self.call(api_key, Method::POST, "/billing/create", Some(payload))
            .await
    }

    /// POST /coupon/create (the coupon API wraps its input in `data`)
    #[instrument(skip(self, api_key, request), fields(code = %request.code))]
    pub async fn create_coupon(
        &self,
        api_key: &str,
        request: &CreateGatewayCouponRequest,
    ) -> Result<GatewayCoupon, GatewayError> {
        self.call(
            api_key,
            Method::POST,
            "/coupon/create",
            Some(json!({ "data": request })),
        )
        .await
    }

    /// GET /coupon/list
    #[instrument(skip(self, api_key))]
    pub async fn list_coupons(&self, api_key: &str) -> Result<Vec<GatewayCoupon>, GatewayError> {
        self.call(api_key, Method::GET, "/coupon/list", None).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        api_key: &str,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, &url).bearer_auth(api_key);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::upstream(Some(status.as_u16()), body));
        }

        let envelope: ApiEnvelope<T> = response.json().await?;
        if let Some(error) = envelope.error {
            if !error.is_null() {
                return Err(GatewayError::upstream(
                    Some(status.as_u16()),
                    error.to_string(),
                ));
            }
        }
        envelope
            .data
            .ok_or_else(|| GatewayError::upstream(Some(status.as_u16()), "empty data".to_string()))
    }
}
