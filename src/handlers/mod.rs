pub mod orders;
pub mod webhooks;

use std::sync::Arc;

use crate::{
    db::DbPool,
    events::EventSender,
    gateway::AbacatePayClient,
    services::{checkout::CheckoutService, orders::OrderService, settlement::SettlementService},
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub checkout: Arc<CheckoutService>,
    pub settlement: Arc<SettlementService>,
    pub orders: Arc<OrderService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        gateway: Arc<AbacatePayClient>,
        frontend_url: &str,
    ) -> Self {
        let checkout = Arc::new(CheckoutService::new(
            db.clone(),
            gateway,
            event_sender.clone(),
            frontend_url,
        ));
        let settlement = Arc::new(SettlementService::new(db.clone(), event_sender));
        let orders = Arc::new(OrderService::new(db));

        Self {
            checkout,
            settlement,
            orders,
        }
    }
}
