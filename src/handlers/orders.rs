use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::{
    auth::AuthenticatedUser,
    errors::ServiceError,
    services::checkout::CheckoutRequest,
    tenant::Tenant,
    AppState,
};

pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/checkout", post(checkout))
}

/// Runs checkout for the authenticated user against the resolved store.
#[utoipa::path(
    post,
    path = "/orders/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order created with optional payment link", body = crate::services::checkout::CheckoutResponse),
        (status = 400, description = "Invalid products, insufficient stock, or invalid coupon", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = crate::errors::ErrorResponse),
        (status = 500, description = "Payment gateway failure; the order was rolled back", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Tenant(store): Tenant,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state
        .services
        .checkout
        .checkout(&store, user.user_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Lists the caller's orders in this store, newest first.
#[utoipa::path(
    get,
    path = "/orders",
    responses(
        (status = 200, description = "Caller's orders with items and delivery", body = [crate::services::orders::OrderView]),
        (status = 401, description = "Missing or invalid bearer token", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Tenant(store): Tenant,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state
        .services
        .orders
        .list_user_orders(store.id, user.user_id)
        .await?;
    Ok(Json(orders))
}
