//! Read-side order queries for the storefront.

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{
        order::{self, Entity as Order, OrderStatus},
        order_delivery::{self, Entity as OrderDelivery},
        order_item,
    },
    errors::ServiceError,
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
    pub product_id: Uuid,
    pub name: String,
    pub code: String,
    pub unit_price_cents: i64,
    pub quantity: i32,
    pub total_cents: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryView {
    pub street: String,
    pub number: String,
    pub district: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: Uuid,
    pub status: OrderStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub shipping_cents: i64,
    pub total_cents: i64,
    pub points_earned: i32,
    pub points_redeemed: i32,
    pub coupon_code: Option<String>,
    pub payment_url_available: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub items: Vec<OrderItemView>,
    pub delivery: Option<DeliveryView>,
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// The caller's orders in this store, newest first, with their items
    /// and delivery address.
    #[instrument(skip(self), fields(store_id = %store_id, user_id = %user_id))]
    pub async fn list_user_orders(
        &self,
        store_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<OrderView>, ServiceError> {
        let db = &*self.db;

        let orders_with_items = Order::find()
            .filter(order::Column::StoreId.eq(store_id))
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .find_with_related(order_item::Entity)
            .all(db)
            .await?;

        let order_ids: Vec<Uuid> = orders_with_items.iter().map(|(o, _)| o.id).collect();
        let deliveries = OrderDelivery::find()
            .filter(order_delivery::Column::OrderId.is_in(order_ids))
            .all(db)
            .await?;

        let views = orders_with_items
            .into_iter()
            .map(|(order, items)| {
                let delivery = deliveries
                    .iter()
                    .find(|d| d.order_id == order.id)
                    .map(|d| DeliveryView {
                        street: d.street.clone(),
                        number: d.number.clone(),
                        district: d.district.clone(),
                        city: d.city.clone(),
                        state: d.state.clone(),
                        zip: d.zip.clone(),
                    });
                OrderView {
                    id: order.id,
                    status: order.status,
                    subtotal_cents: order.subtotal_cents,
                    discount_cents: order.discount_cents,
                    shipping_cents: order.shipping_cents,
                    total_cents: order.total_cents,
                    points_earned: order.points_earned,
                    points_redeemed: order.points_redeemed,
                    coupon_code: order.coupon_code,
                    payment_url_available: order.abacate_billing_id.is_some(),
                    created_at: order.created_at,
                    items: items
                        .into_iter()
                        .map(|item| OrderItemView {
                            product_id: item.product_id,
                            name: item.name_snapshot,
                            code: item.code_snapshot,
                            unit_price_cents: item.unit_price_cents,
                            quantity: item.quantity,
                            total_cents: item.total_cents,
                        })
                        .collect(),
                    delivery,
                }
            })
            .collect();

        Ok(views)
    }
}
