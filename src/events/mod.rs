use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Domain events emitted by the checkout and settlement flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    OrderPaid(Uuid),
    OrderCancelled(Uuid),

    // Checkout events
    CheckoutCompleted {
        order_id: Uuid,
        store_id: Uuid,
        total_cents: i64,
    },

    // Inventory events
    InventoryDecremented {
        store_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    InventoryRestored {
        store_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },

    // Loyalty events
    PointsGranted {
        user_id: Uuid,
        order_id: Uuid,
        points: i32,
    },
    PointsRedeemed {
        user_id: Uuid,
        order_id: Uuid,
        points: i32,
    },
    InfluencerBonusGranted {
        influencer_id: Uuid,
        order_id: Uuid,
        points: i32,
    },
    CouponRedeemed {
        coupon_code: String,
        order_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Background consumer for domain events. Today events only feed
/// structured logs; downstream consumers (notifications, analytics)
/// attach here.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(%order_id, "event: order created");
            }
            Event::OrderPaid(order_id) => {
                info!(%order_id, "event: order paid");
            }
            Event::OrderCancelled(order_id) => {
                info!(%order_id, "event: order cancelled");
            }
            Event::CheckoutCompleted {
                order_id,
                store_id,
                total_cents,
            } => {
                info!(%order_id, %store_id, total_cents, "event: checkout completed");
            }
            Event::InventoryDecremented {
                store_id,
                product_id,
                quantity,
            } => {
                info!(%store_id, %product_id, quantity, "event: inventory decremented");
            }
            Event::InventoryRestored {
                store_id,
                product_id,
                quantity,
            } => {
                info!(%store_id, %product_id, quantity, "event: inventory restored");
            }
            Event::PointsGranted {
                user_id,
                order_id,
                points,
            } => {
                info!(%user_id, %order_id, points, "event: points granted");
            }
            Event::PointsRedeemed {
                user_id,
                order_id,
                points,
            } => {
                info!(%user_id, %order_id, points, "event: points redeemed");
            }
            Event::InfluencerBonusGranted {
                influencer_id,
                order_id,
                points,
            } => {
                info!(%influencer_id, %order_id, points, "event: influencer bonus granted");
            }
            Event::CouponRedeemed {
                coupon_code,
                order_id,
            } => {
                info!(coupon_code = %coupon_code, %order_id, "event: coupon redeemed");
            }
        }
    }
    info!("Event channel closed; event processor exiting");
}
