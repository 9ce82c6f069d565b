//! Storefront API Library
//!
//! Multi-tenant storefront backend: checkout with coupons and loyalty
//! points, payment-link creation, and webhook-driven order settlement.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod openapi;
pub mod services;
pub mod tenant;
pub mod webhooks;

use axum::{extract::State, response::Json, routing::get, Router};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Storefront routes: health, orders, and the payment webhook.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .nest("/orders", handlers::orders::orders_routes())
        .nest("/webhooks", handlers::webhooks::webhook_routes())
}

/// Full application router with API docs and HTTP tracing.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(api_routes())
        .merge(openapi::swagger_ui())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<Value>, errors::ServiceError> {
    state.db.ping().await?;
    Ok(Json(json!({
        "ok": true,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}
