//! Checkout orchestration.
//!
//! Creating an order, issuing the payment link, and committing inventory
//! is a manual saga: the gateway call cannot live inside a database
//! transaction, so each step carries an explicit compensation. Gateway
//! failure after the order is persisted deletes the order again; the
//! inventory decrement is a conditional atomic update so concurrent
//! checkouts can never drive stock below zero.

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        coupon::{self, Entity as Coupon},
        order::{self, OrderStatus},
        order_delivery, order_item,
        product::{self, Entity as Product},
        store,
        store_inventory::{self, Entity as StoreInventory},
        user::{self, Entity as User},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{AbacatePayClient, BillingProduct, CreateBillingRequest, CreateCustomerRequest},
    services::{points, pricing, shipping},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[validate(length(min = 1, message = "Cart must have at least one item"))]
    pub items: Vec<CheckoutItem>,
    pub delivery: DeliveryAddress,
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub points_redeem: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DeliveryAddress {
    pub street: String,
    pub number: String,
    pub district: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub total_cents: i64,
    pub payment: Option<PaymentLink>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLink {
    pub billing_id: String,
    pub url: Option<String>,
}

struct ItemSnapshot {
    product_id: Uuid,
    name: String,
    code: String,
    unit_price_cents: i64,
    quantity: i32,
    total_cents: i64,
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DbPool>,
    gateway: Arc<AbacatePayClient>,
    event_sender: EventSender,
    frontend_url: String,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DbPool>,
        gateway: Arc<AbacatePayClient>,
        event_sender: EventSender,
        frontend_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            gateway,
            event_sender,
            frontend_url: frontend_url.into(),
        }
    }

    /// Runs a checkout for an authenticated user against a resolved store.
    ///
    /// Not idempotent by design: every call creates a new order. Callers
    /// must not blindly retry ambiguous network failures.
    #[instrument(skip(self, request), fields(store_id = %store.id, user_id = %user_id))]
    pub async fn checkout(
        &self,
        store: &store::Model,
        user_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<CheckoutResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if request.items.iter().any(|item| item.quantity <= 0) {
            return Err(ServiceError::ValidationError(
                "Item quantities must be positive".into(),
            ));
        }

        let db = &*self.db;

        // 1. Resolve products, reporting every unknown id at once.
        let product_ids: Vec<Uuid> = request.items.iter().map(|i| i.product_id).collect();
        let products = Product::find()
            .filter(product::Column::Id.is_in(product_ids.clone()))
            .all(db)
            .await?;
        let found: std::collections::HashSet<Uuid> = products.iter().map(|p| p.id).collect();
        let missing: Vec<Uuid> = product_ids
            .iter()
            .copied()
            .filter(|id| !found.contains(id))
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::InvalidProducts { missing });
        }
        let product_map: HashMap<Uuid, &product::Model> =
            products.iter().map(|p| (p.id, p)).collect();

        // 2. Best-effort stock pre-check for a descriptive error. The
        // authoritative check is the conditional decrement later.
        let inventory = StoreInventory::find()
            .filter(store_inventory::Column::StoreId.eq(store.id))
            .filter(store_inventory::Column::ProductId.is_in(product_ids))
            .all(db)
            .await?;
        let available: HashMap<Uuid, i32> = inventory
            .iter()
            .map(|row| (row.product_id, row.quantity))
            .collect();
        for item in &request.items {
            let on_hand = available.get(&item.product_id).copied().unwrap_or(0);
            if item.quantity > on_hand {
                return Err(ServiceError::InsufficientStock {
                    product_id: item.product_id,
                    available: on_hand,
                });
            }
        }

        // 3. Snapshot line items at today's sale price.
        let snapshots: Vec<ItemSnapshot> = request
            .items
            .iter()
            .map(|item| {
                let product = product_map[&item.product_id];
                ItemSnapshot {
                    product_id: product.id,
                    name: product.name.clone(),
                    code: product.code.clone(),
                    unit_price_cents: product.sale_price_cents,
                    quantity: item.quantity,
                    total_cents: product.sale_price_cents * item.quantity as i64,
                }
            })
            .collect();
        let subtotal_cents = pricing::subtotal(
            snapshots
                .iter()
                .map(|s| (s.unit_price_cents, s.quantity)),
        );

        // 4. Coupon lookup and discount.
        let mut discount_cents = 0i64;
        let mut applied_coupon: Option<coupon::Model> = None;
        if let Some(code) = request.coupon_code.as_deref() {
            let found = Coupon::find()
                .filter(coupon::Column::Code.eq(code))
                .one(db)
                .await?;
            let found = match found {
                Some(c) if c.active => c,
                _ => return Err(ServiceError::InvalidCoupon(code.to_string())),
            };
            let terms = pricing::CouponTerms {
                kind: found.kind,
                value: found.value,
            };
            discount_cents += pricing::apply_coupon(subtotal_cents, Some(&terms)).discount_cents;
            applied_coupon = Some(found);
        }

        // 5. Points redemption, capped at the live balance.
        let mut points_redeemed = 0i32;
        if request.points_redeem > 0 {
            let balance = points::user_balance(db, user_id).await?;
            points_redeemed = points::clamp_redemption(request.points_redeem, balance);
            discount_cents += points_redeemed as i64 * points::POINT_VALUE_CENTS;
        }

        // 6–7. Shipping and totals.
        let shipping_cents = shipping::quote_shipping(&shipping::ShippingInput {
            zip: request.delivery.zip.clone(),
            city: request.delivery.city.clone(),
            state: request.delivery.state.clone(),
            subtotal_cents,
        });
        let total_cents = (subtotal_cents - discount_cents + shipping_cents).max(0);
        let points_earned = points::earned_for_subtotal(subtotal_cents);

        // 8. Persist the PENDING order with items and delivery address.
        // This transaction is the durability point.
        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let txn = db.begin().await?;

        let order_row = order::ActiveModel {
            id: Set(order_id),
            store_id: Set(store.id),
            user_id: Set(user_id),
            status: Set(OrderStatus::Pending),
            subtotal_cents: Set(subtotal_cents),
            discount_cents: Set(discount_cents),
            shipping_cents: Set(shipping_cents),
            total_cents: Set(total_cents),
            points_earned: Set(points_earned),
            points_redeemed: Set(points_redeemed),
            coupon_code: Set(applied_coupon.as_ref().map(|c| c.code.clone())),
            influencer_id: Set(applied_coupon.as_ref().and_then(|c| c.influencer_id)),
            abacate_billing_id: Set(None),
            abacate_status: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
        };
        order_row.insert(&txn).await?;

        let item_rows: Vec<order_item::ActiveModel> = snapshots
            .iter()
            .map(|s| order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(s.product_id),
                name_snapshot: Set(s.name.clone()),
                code_snapshot: Set(s.code.clone()),
                unit_price_cents: Set(s.unit_price_cents),
                quantity: Set(s.quantity),
                total_cents: Set(s.total_cents),
            })
            .collect();
        order_item::Entity::insert_many(item_rows).exec(&txn).await?;

        let delivery_row = order_delivery::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            street: Set(request.delivery.street.clone()),
            number: Set(request.delivery.number.clone()),
            district: Set(request.delivery.district.clone()),
            city: Set(request.delivery.city.clone()),
            state: Set(request.delivery.state.clone()),
            zip: Set(request.delivery.zip.clone()),
        };
        delivery_row.insert(&txn).await?;

        txn.commit().await?;
        info!(%order_id, subtotal_cents, total_cents, "order persisted as PENDING");

        // 9. Resolve or create the gateway customer. Without a phone the
        // order proceeds with no payment link.
        let customer_id = match self.resolve_customer(store, user_id, order_id).await {
            Ok(customer_id) => customer_id,
            Err(err) => {
                self.compensate_order(order_id).await;
                return Err(err);
            }
        };

        // 10–11. Billing link, then inventory commit.
        let payment = match customer_id {
            Some(customer_id) => {
                let billing = match self
                    .create_billing(store, order_id, &customer_id, &snapshots, &applied_coupon)
                    .await
                {
                    Ok(billing) => billing,
                    Err(err) => {
                        // No inventory was touched yet, so deleting the
                        // order is the whole compensation.
                        self.compensate_order(order_id).await;
                        return Err(err);
                    }
                };

                if let Err(err) = self
                    .record_billing_and_commit_inventory(store, order_id, &billing.id, &snapshots)
                    .await
                {
                    self.compensate_order(order_id).await;
                    return Err(err);
                }

                Some(PaymentLink {
                    billing_id: billing.id,
                    url: billing.url,
                })
            }
            None => {
                info!(%order_id, "user has no phone and no cached customer id; returning without payment link");
                None
            }
        };

        let _ = self
            .event_sender
            .send(Event::OrderCreated(order_id))
            .await
            .map_err(|e| warn!(error = %e, "failed to send order created event"));
        let _ = self
            .event_sender
            .send(Event::CheckoutCompleted {
                order_id,
                store_id: store.id,
                total_cents,
            })
            .await
            .map_err(|e| warn!(error = %e, "failed to send checkout completed event"));

        Ok(CheckoutResponse {
            order_id,
            total_cents,
            payment,
        })
    }

    /// Returns the user's gateway customer id, creating and caching one
    /// when the user has a phone number. `None` means the gateway cannot
    /// be used for this user yet.
    async fn resolve_customer(
        &self,
        store: &store::Model,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<String>, ServiceError> {
        let db = &*self.db;
        let user = User::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        if let Some(existing) = user.abacate_customer_id.clone() {
            return Ok(Some(existing));
        }

        let phone = match user.phone.clone().filter(|p| !p.trim().is_empty()) {
            Some(phone) => phone,
            None => return Ok(None),
        };

        let api_key = store
            .abacatepay_api_key
            .as_deref()
            .ok_or(ServiceError::StoreNotConfigured)?;

        let created = self
            .gateway
            .create_customer(
                api_key,
                &CreateCustomerRequest {
                    name: user.name.clone(),
                    email: user.email.clone(),
                    tax_id: user.tax_id.clone(),
                    cellphone: phone,
                },
            )
            .await
            .map_err(|err| {
                error!(error = %err, %order_id, "gateway customer creation failed");
                ServiceError::Gateway(err)
            })?;

        let mut user_update: user::ActiveModel = user.into();
        user_update.abacate_customer_id = Set(Some(created.id.clone()));
        user_update.update(db).await?;

        Ok(Some(created.id))
    }

    async fn create_billing(
        &self,
        store: &store::Model,
        order_id: Uuid,
        customer_id: &str,
        snapshots: &[ItemSnapshot],
        applied_coupon: &Option<coupon::Model>,
    ) -> Result<crate::gateway::Billing, ServiceError> {
        let api_key = store
            .abacatepay_api_key
            .as_deref()
            .ok_or(ServiceError::StoreNotConfigured)?;

        let request = CreateBillingRequest {
            customer_id: customer_id.to_string(),
            products: snapshots
                .iter()
                .map(|s| BillingProduct {
                    external_id: s.code.clone(),
                    name: s.name.clone(),
                    description: Some(format!("Produto: {}", s.name)),
                    price: s.unit_price_cents,
                    quantity: s.quantity,
                })
                .collect(),
            coupons: applied_coupon.as_ref().map(|c| vec![c.code.clone()]),
            allow_coupons: false,
            return_url: format!(
                "{}/checkout/success?orderId={}",
                self.frontend_url, order_id
            ),
            completion_url: format!(
                "{}/checkout/completion?orderId={}",
                self.frontend_url, order_id
            ),
            external_id: Some(order_id.to_string()),
        };

        self.gateway
            .create_billing(api_key, &request)
            .await
            .map_err(|err| {
                error!(error = %err, %order_id, "gateway billing creation failed");
                ServiceError::Gateway(err)
            })
    }

    /// Records the billing id on the order and decrements stock for every
    /// line item in one transaction. Each decrement is conditional
    /// (`quantity >= requested`); a raced-out line rolls the whole
    /// transaction back.
    async fn record_billing_and_commit_inventory(
        &self,
        store: &store::Model,
        order_id: Uuid,
        billing_id: &str,
        snapshots: &[ItemSnapshot],
    ) -> Result<(), ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;

        order::Entity::update_many()
            .set(order::ActiveModel {
                abacate_billing_id: Set(Some(billing_id.to_string())),
                abacate_status: Set(Some("CREATED".to_string())),
                updated_at: Set(Some(Utc::now())),
                ..Default::default()
            })
            .filter(order::Column::Id.eq(order_id))
            .exec(&txn)
            .await?;

        for snapshot in snapshots {
            let result = store_inventory::Entity::update_many()
                .col_expr(
                    store_inventory::Column::Quantity,
                    Expr::col(store_inventory::Column::Quantity).sub(snapshot.quantity),
                )
                .filter(store_inventory::Column::StoreId.eq(store.id))
                .filter(store_inventory::Column::ProductId.eq(snapshot.product_id))
                .filter(store_inventory::Column::Quantity.gte(snapshot.quantity))
                .exec(&txn)
                .await?;

            if result.rows_affected == 0 {
                // A concurrent checkout won the stock; surface the loss
                // with the quantity that is actually left.
                txn.rollback().await?;
                let on_hand = StoreInventory::find()
                    .filter(store_inventory::Column::StoreId.eq(store.id))
                    .filter(store_inventory::Column::ProductId.eq(snapshot.product_id))
                    .one(db)
                    .await?
                    .map(|row| row.quantity)
                    .unwrap_or(0);
                return Err(ServiceError::InsufficientStock {
                    product_id: snapshot.product_id,
                    available: on_hand,
                });
            }
        }

        txn.commit().await?;

        for snapshot in snapshots {
            let _ = self
                .event_sender
                .send(Event::InventoryDecremented {
                    store_id: store.id,
                    product_id: snapshot.product_id,
                    quantity: snapshot.quantity,
                })
                .await;
        }

        Ok(())
    }

    /// Deletes a just-created order with its items and delivery. Runs
    /// after a gateway failure, before any inventory was committed.
    async fn compensate_order(&self, order_id: Uuid) {
        let db = &*self.db;
        let result: Result<(), ServiceError> = async {
            let txn = db.begin().await?;
            order_item::Entity::delete_many()
                .filter(order_item::Column::OrderId.eq(order_id))
                .exec(&txn)
                .await?;
            order_delivery::Entity::delete_many()
                .filter(order_delivery::Column::OrderId.eq(order_id))
                .exec(&txn)
                .await?;
            order::Entity::delete_by_id(order_id).exec(&txn).await?;
            txn.commit().await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => info!(%order_id, "compensated: order deleted after gateway failure"),
            // Operational tooling sweeps orders left behind by a failed
            // compensation; they are PENDING with no billing id.
            Err(err) => error!(error = %err, %order_id, "order compensation failed"),
        }
    }
}
