//! Webhook-driven order settlement.
//!
//! Orders move PENDING → PAID or PENDING → CANCELLED and never leave a
//! terminal state. The transition guard is a conditional update executed
//! inside the settlement transaction, so duplicate or concurrent
//! deliveries of the same event settle exactly once; the losers observe
//! zero affected rows and acknowledge without side effects.

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{
        coupon::{self, Entity as Coupon},
        coupon_redemption,
        order::{self, Entity as Order, OrderStatus},
        order_item::{self, Entity as OrderItem},
        store::Entity as Store,
        store_inventory,
        user_points_transaction::PointsReason,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::points,
    webhooks,
};

/// Provider event types this reconciler acts on.
const EVENT_PAID: &str = "billing.paid";
const EVENT_FAILED: &str = "billing.failed";
const EVENT_CANCELLED: &str = "billing.cancelled";

#[derive(Debug, Deserialize)]
struct ProviderEvent {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Order transitioned to PAID with all side effects applied.
    Paid,
    /// Order transitioned to CANCELLED and stock was restored.
    Cancelled,
    /// Recognized-but-irrelevant event or already-terminal order; no
    /// side effects. Acknowledged with success to stop redelivery.
    Ignored,
}

#[derive(Clone)]
pub struct SettlementService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl SettlementService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Processes one provider callback: extracts the billing id, resolves
    /// the order and its store, verifies the signature with the store's
    /// own secret, then applies the state transition.
    ///
    /// The secret is bound late, looked up through the order rather than
    /// global config, so each tenant's callbacks verify against its own
    /// secret.
    #[instrument(skip(self, raw_body, signature_header))]
    pub async fn process(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<SettlementOutcome, ServiceError> {
        let signature = signature_header
            .and_then(webhooks::parse_signature_header)
            .ok_or(ServiceError::InvalidSignature)?;

        // The payload is parsed only to find the billing id; nothing else
        // is trusted until the signature checks out.
        let event: ProviderEvent = serde_json::from_slice(raw_body)
            .map_err(|e| ServiceError::BadRequest(format!("invalid webhook payload: {}", e)))?;
        let billing_id = event
            .data
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or(ServiceError::MissingBillingId)?;

        let db = &*self.db;
        let found = Order::find()
            .filter(order::Column::AbacateBillingId.eq(billing_id))
            .find_also_related(Store)
            .one(db)
            .await?;

        let (order, secret) = match found {
            Some((order, Some(store))) => match store.abacatepay_webhook_secret.clone() {
                Some(secret) => (order, secret),
                None => return Err(ServiceError::StoreNotConfigured),
            },
            // Unknown billing ids are indistinguishable from unknown
            // tenants; both get the same unauthorized answer.
            _ => return Err(ServiceError::StoreNotConfigured),
        };

        if !webhooks::verify_signature(raw_body, signature, &secret) {
            warn!(billing_id, order_id = %order.id, "webhook signature verification failed");
            return Err(ServiceError::InvalidSignature);
        }

        match event.kind.as_deref() {
            Some(EVENT_PAID) => self.settle_paid(order).await,
            Some(EVENT_FAILED) => self.settle_cancelled(order, "FAILED").await,
            Some(EVENT_CANCELLED) => self.settle_cancelled(order, "CANCELLED").await,
            other => {
                info!(event_type = ?other, billing_id, "ignoring unhandled webhook event type");
                Ok(SettlementOutcome::Ignored)
            }
        }
    }

    /// PENDING → PAID with ledger, coupon, and influencer side effects,
    /// all inside one transaction.
    async fn settle_paid(&self, order: order::Model) -> Result<SettlementOutcome, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;

        let claimed = Order::update_many()
            .set(order::ActiveModel {
                status: Set(OrderStatus::Paid),
                abacate_status: Set(Some("PAID".to_string())),
                updated_at: Set(Some(Utc::now())),
                ..Default::default()
            })
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .exec(&txn)
            .await?;
        if claimed.rows_affected == 0 {
            txn.rollback().await?;
            info!(order_id = %order.id, "order already settled; paid event is a no-op");
            return Ok(SettlementOutcome::Ignored);
        }

        if order.points_redeemed > 0 {
            points::apply_user_delta(
                &txn,
                order.user_id,
                Some(order.id),
                -order.points_redeemed,
                PointsReason::RedeemOrder,
            )
            .await?;
        }

        if order.points_earned > 0 {
            points::apply_user_delta(
                &txn,
                order.user_id,
                Some(order.id),
                order.points_earned,
                PointsReason::EarnOrder,
            )
            .await?;
        }

        let mut influencer_bonus: Option<(Uuid, i32)> = None;
        if let Some(code) = order.coupon_code.as_deref() {
            let found = Coupon::find()
                .filter(coupon::Column::Code.eq(code))
                .one(&txn)
                .await?;
            if let Some(found) = found {
                Coupon::update_many()
                    .col_expr(
                        coupon::Column::UsedCount,
                        Expr::col(coupon::Column::UsedCount).add(1),
                    )
                    .filter(coupon::Column::Id.eq(found.id))
                    .exec(&txn)
                    .await?;

                let redemption = coupon_redemption::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    coupon_id: Set(found.id),
                    order_id: Set(order.id),
                    user_id: Set(order.user_id),
                    amount_discount_cents: Set(order.discount_cents),
                    created_at: Set(Utc::now()),
                };
                redemption.insert(&txn).await?;

                if let Some(influencer_id) = order.influencer_id {
                    let bonus = points::influencer_bonus_for_discount(order.discount_cents);
                    if bonus > 0 {
                        points::credit_influencer(&txn, influencer_id, Some(order.id), bonus)
                            .await?;
                        influencer_bonus = Some((influencer_id, bonus));
                    }
                }
            }
        }

        txn.commit().await?;
        info!(order_id = %order.id, "order settled as PAID");

        let _ = self.event_sender.send(Event::OrderPaid(order.id)).await;
        if order.points_redeemed > 0 {
            let _ = self
                .event_sender
                .send(Event::PointsRedeemed {
                    user_id: order.user_id,
                    order_id: order.id,
                    points: order.points_redeemed,
                })
                .await;
        }
        if order.points_earned > 0 {
            let _ = self
                .event_sender
                .send(Event::PointsGranted {
                    user_id: order.user_id,
                    order_id: order.id,
                    points: order.points_earned,
                })
                .await;
        }
        if let Some(code) = order.coupon_code.clone() {
            let _ = self
                .event_sender
                .send(Event::CouponRedeemed {
                    coupon_code: code,
                    order_id: order.id,
                })
                .await;
        }
        if let Some((influencer_id, bonus)) = influencer_bonus {
            let _ = self
                .event_sender
                .send(Event::InfluencerBonusGranted {
                    influencer_id,
                    order_id: order.id,
                    points: bonus,
                })
                .await;
        }

        Ok(SettlementOutcome::Paid)
    }

    /// PENDING → CANCELLED, restoring the stock every line item took.
    async fn settle_cancelled(
        &self,
        order: order::Model,
        provider_status: &str,
    ) -> Result<SettlementOutcome, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;

        let claimed = Order::update_many()
            .set(order::ActiveModel {
                status: Set(OrderStatus::Cancelled),
                abacate_status: Set(Some(provider_status.to_string())),
                updated_at: Set(Some(Utc::now())),
                ..Default::default()
            })
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .exec(&txn)
            .await?;
        if claimed.rows_affected == 0 {
            txn.rollback().await?;
            info!(order_id = %order.id, "order already settled; cancel event is a no-op");
            return Ok(SettlementOutcome::Ignored);
        }

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(&txn)
            .await?;
        for item in &items {
            store_inventory::Entity::update_many()
                .col_expr(
                    store_inventory::Column::Quantity,
                    Expr::col(store_inventory::Column::Quantity).add(item.quantity),
                )
                .filter(store_inventory::Column::StoreId.eq(order.store_id))
                .filter(store_inventory::Column::ProductId.eq(item.product_id))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        info!(order_id = %order.id, provider_status, "order settled as CANCELLED, stock restored");

        let _ = self
            .event_sender
            .send(Event::OrderCancelled(order.id))
            .await;
        for item in &items {
            let _ = self
                .event_sender
                .send(Event::InventoryRestored {
                    store_id: order.store_id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .await;
        }

        Ok(SettlementOutcome::Cancelled)
    }
}
