//! Tenant resolution from the request host.
//!
//! Every store is served from its own subdomain (`<store>.example.com`);
//! the first host label selects the `stores` row, which carries the
//! tenant's gateway credentials.

use axum::{
    extract::FromRequestParts,
    http::{header::HOST, request::Parts},
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::debug;

use crate::{
    entities::store::{self, Entity as Store},
    errors::ServiceError,
    AppState,
};

/// Extractor resolving the request's tenant store.
#[derive(Debug, Clone)]
pub struct Tenant(pub store::Model);

/// First label of the host, with any port stripped.
/// "cascavel.localhost:3000" resolves to "cascavel".
pub fn subdomain_of(host: &str) -> Option<&str> {
    let host = host.split(':').next().unwrap_or(host);
    let label = host.split('.').next().unwrap_or("");
    if label.is_empty() {
        None
    } else {
        Some(label)
    }
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for Tenant {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let host = parts
            .headers
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        let subdomain = subdomain_of(host).ok_or(ServiceError::StoreNotIdentified)?;

        let found = Store::find()
            .filter(store::Column::Subdomain.eq(subdomain))
            .one(&*state.db)
            .await?;

        match found {
            Some(store) => {
                debug!(store_id = %store.id, subdomain, "resolved tenant");
                Ok(Tenant(store))
            }
            None => Err(ServiceError::StoreNotFound(subdomain.to_string())),
        }
    }
}
