//! End-to-end checkout and settlement tests over SQLite with a mocked
//! payment provider.
//!
//! Covers the full saga: checkout → billing link → inventory commit,
//! gateway-failure compensation, and webhook-driven settlement with
//! idempotent redelivery.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storefront_api as api;

use api::entities::order::OrderStatus;
use api::entities::user_points_transaction::PointsReason;
use api::entities::{
    coupon, coupon_redemption, influencer_points_account, order, store, store_inventory, user,
    user_points_account, user_points_transaction,
};

const JWT_SECRET: &str = "integration_test_secret_0123456789abcdef";
const WEBHOOK_SECRET: &str = "whsec_integration";
const BILLING_ID: &str = "bill_test_1";

struct TestApp {
    state: api::AppState,
    db: Arc<sea_orm::DatabaseConnection>,
    mock: MockServer,
    store_id: Uuid,
    user_id: Uuid,
    _tmp: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let tmp = TempDir::new().expect("temp dir");
        let db_url = format!(
            "sqlite://{}?mode=rwc",
            tmp.path().join("storefront-test.db").display()
        );
        let db = api::db::establish_connection(&db_url).await.expect("db");
        api::db::run_migrations(&db).await.expect("migrations");
        let db = Arc::new(db);

        let mock = MockServer::start().await;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let event_sender = api::events::EventSender::new(tx);
        tokio::spawn(api::events::process_events(rx));

        let gateway = Arc::new(api::gateway::AbacatePayClient::new(mock.uri()));
        let services = api::handlers::AppServices::new(
            db.clone(),
            event_sender.clone(),
            gateway,
            "http://front.test",
        );

        let config = api::config::AppConfig::new(db_url, JWT_SECRET, "127.0.0.1", 0, "test");
        let state = api::AppState {
            db: db.clone(),
            config,
            event_sender,
            services,
        };

        let store_id = Uuid::new_v4();
        store::ActiveModel {
            id: Set(store_id),
            name: Set("Cantina Cascavel".into()),
            subdomain: Set("cascavel".into()),
            abacatepay_api_key: Set(Some("sk_tenant_test".into())),
            abacatepay_webhook_secret: Set(Some(WEBHOOK_SECRET.into())),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*db)
        .await
        .expect("seed store");

        let user_id = Uuid::new_v4();
        user::ActiveModel {
            id: Set(user_id),
            name: Set("Maria Souza".into()),
            email: Set("maria@example.com".into()),
            tax_id: Set("12345678900".into()),
            phone: Set(Some("+5545999990000".into())),
            abacate_customer_id: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(&*db)
        .await
        .expect("seed user");

        Self {
            state,
            db,
            mock,
            store_id,
            user_id,
            _tmp: tmp,
        }
    }

    async fn seed_product(&self, code: &str, sale_price_cents: i64, stock: i32) -> Uuid {
        let product_id = Uuid::new_v4();
        api::entities::product::ActiveModel {
            id: Set(product_id),
            code: Set(code.to_string()),
            name: Set(format!("Produto {}", code)),
            description: Set(None),
            cost_price_cents: Set(sale_price_cents / 2),
            sale_price_cents: Set(sale_price_cents),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("seed product");

        store_inventory::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(self.store_id),
            product_id: Set(product_id),
            quantity: Set(stock),
        }
        .insert(&*self.db)
        .await
        .expect("seed inventory");

        product_id
    }

    async fn seed_coupon(&self, code: &str, value: i64, influencer_id: Option<Uuid>) {
        coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            kind: Set(coupon::CouponKind::Percent),
            value: Set(value),
            active: Set(true),
            used_count: Set(0),
            influencer_id: Set(influencer_id),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("seed coupon");
    }

    async fn seed_points_balance(&self, balance: i32) {
        user_points_account::ActiveModel {
            user_id: Set(self.user_id),
            balance: Set(balance),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("seed points account");
    }

    async fn mock_gateway_success(&self) {
        Mock::given(method("POST"))
            .and(path("/customer/create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "id": "cust_test_1",
                    "metadata": {
                        "name": "Maria Souza",
                        "email": "maria@example.com",
                        "taxId": "12345678900",
                        "cellphone": "+5545999990000"
                    }
                },
                "error": null
            })))
            .mount(&self.mock)
            .await;

        Mock::given(method("POST"))
            .and(path("/billing/create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "id": BILLING_ID,
                    "url": "https://pay.example/bill_test_1",
                    "status": "PENDING",
                    "amount": 2000
                },
                "error": null
            })))
            .mount(&self.mock)
            .await;
    }

    fn token(&self) -> String {
        api::auth::issue_token(self.user_id, JWT_SECRET, Duration::minutes(15)).expect("token")
    }

    async fn send(&self, request: Request<Body>) -> Response {
        api::app(self.state.clone())
            .oneshot(request)
            .await
            .expect("request")
    }

    async fn checkout(&self, payload: Value) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri("/orders/checkout")
            .header(header::HOST, "cascavel.localhost")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token()))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .expect("checkout request");
        self.send(request).await
    }

    async fn webhook(&self, body: &str, secret: &str) -> Response {
        let signature = api::webhooks::compute_signature(body.as_bytes(), secret);
        let request = Request::builder()
            .method("POST")
            .uri("/webhooks/abacatepay")
            .header("x-abacate-signature", format!("sha256={}", signature))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("webhook request");
        self.send(request).await
    }

    async fn stock_of(&self, product_id: Uuid) -> i32 {
        store_inventory::Entity::find()
            .filter(store_inventory::Column::StoreId.eq(self.store_id))
            .filter(store_inventory::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await
            .expect("stock query")
            .map(|row| row.quantity)
            .unwrap_or(0)
    }

    async fn only_order(&self) -> order::Model {
        order::Entity::find()
            .one(&*self.db)
            .await
            .expect("order query")
            .expect("an order should exist")
    }

    async fn order_count(&self) -> u64 {
        order::Entity::find().count(&*self.db).await.expect("count")
    }

    async fn points_balance(&self) -> i32 {
        user_points_account::Entity::find()
            .filter(user_points_account::Column::UserId.eq(self.user_id))
            .one(&*self.db)
            .await
            .expect("points query")
            .map(|account| account.balance)
            .unwrap_or(0)
    }

    async fn ledger_count(&self, reason: PointsReason) -> u64 {
        user_points_transaction::Entity::find()
            .filter(user_points_transaction::Column::UserId.eq(self.user_id))
            .filter(user_points_transaction::Column::Reason.eq(reason))
            .count(&*self.db)
            .await
            .expect("ledger count")
    }
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

fn cart(product_id: Uuid, quantity: i32) -> Value {
    json!({
        "items": [{ "productId": product_id, "quantity": quantity }],
        "delivery": {
            "street": "Rua das Palmeiras",
            "number": "120",
            "district": "Centro",
            "city": "Cascavel",
            "state": "PR",
            "zip": "85800-000"
        }
    })
}

fn paid_event() -> String {
    json!({ "type": "billing.paid", "data": { "id": BILLING_ID } }).to_string()
}

fn cancelled_event() -> String {
    json!({ "type": "billing.cancelled", "data": { "id": BILLING_ID } }).to_string()
}

#[tokio::test]
async fn checkout_decrements_stock_and_returns_payment_link() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("PRATO-1", 1000, 5).await;
    app.mock_gateway_success().await;

    let response = app.checkout(cart(product_id, 2)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    // subtotal 2000, no discount, PR shipping 1200
    assert_eq!(body["totalCents"], 3200);
    assert_eq!(body["payment"]["billingId"], BILLING_ID);
    assert_eq!(body["payment"]["url"], "https://pay.example/bill_test_1");

    assert_eq!(app.stock_of(product_id).await, 3);

    let order = app.only_order().await;
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.subtotal_cents, 2000);
    assert_eq!(order.points_earned, 2);
    assert_eq!(order.abacate_billing_id.as_deref(), Some(BILLING_ID));
    assert_eq!(order.abacate_status.as_deref(), Some("CREATED"));
}

#[tokio::test]
async fn checkout_rejects_insufficient_stock_without_creating_an_order() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("PRATO-1", 1000, 5).await;
    app.mock_gateway_success().await;

    let response = app.checkout(cart(product_id, 10)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["details"]["available"], 5);

    assert_eq!(app.order_count().await, 0);
    assert_eq!(app.stock_of(product_id).await, 5);
}

#[tokio::test]
async fn checkout_rejects_unknown_products_listing_missing_ids() {
    let app = TestApp::new().await;
    app.mock_gateway_success().await;
    let ghost = Uuid::new_v4();

    let response = app.checkout(cart(ghost, 1)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"], "invalid_products");
    assert_eq!(body["details"]["missing"][0], ghost.to_string());
    assert_eq!(app.order_count().await, 0);
}

#[tokio::test]
async fn checkout_rejects_unknown_coupon() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("PRATO-1", 1000, 5).await;
    app.mock_gateway_success().await;

    let mut payload = cart(product_id, 1);
    payload["couponCode"] = json!("NOPE");

    let response = app.checkout(payload).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "invalid_coupon");
    assert_eq!(app.order_count().await, 0);
}

#[tokio::test]
async fn gateway_failure_rolls_the_order_back() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("PRATO-1", 1000, 5).await;

    Mock::given(method("POST"))
        .and(path("/customer/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "cust_test_1",
                "metadata": {
                    "name": "Maria Souza",
                    "email": "maria@example.com",
                    "taxId": "12345678900",
                    "cellphone": "+5545999990000"
                }
            },
            "error": null
        })))
        .mount(&app.mock)
        .await;
    Mock::given(method("POST"))
        .and(path("/billing/create"))
        .respond_with(ResponseTemplate::new(500).set_body_string("provider exploded"))
        .mount(&app.mock)
        .await;

    let response = app.checkout(cart(product_id, 2)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "gateway_failed");

    // Compensation removed the order; inventory was never touched.
    assert_eq!(app.order_count().await, 0);
    assert_eq!(app.stock_of(product_id).await, 5);
}

#[tokio::test]
async fn user_without_phone_checks_out_with_null_payment() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("PRATO-1", 1000, 5).await;

    let mut user_update: user::ActiveModel = user::Entity::find_by_id(app.user_id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap()
        .into();
    user_update.phone = Set(None);
    user_update.update(&*app.db).await.unwrap();

    let response = app.checkout(cart(product_id, 1)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert!(body["payment"].is_null());
    assert_eq!(app.order_count().await, 1);
}

#[tokio::test]
async fn points_redemption_is_capped_at_balance() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("PRATO-1", 1000, 5).await;
    app.seed_points_balance(3).await;
    app.mock_gateway_success().await;

    let mut payload = cart(product_id, 2);
    payload["pointsRedeem"] = json!(10);

    let response = app.checkout(payload).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let order = app.only_order().await;
    assert_eq!(order.points_redeemed, 3);
    // 3 points at 10 cents each
    assert_eq!(order.discount_cents, 30);
    assert_eq!(order.total_cents, 2000 - 30 + 1200);
}

#[tokio::test]
async fn paid_webhook_settles_once_and_redelivery_is_a_noop() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("PRATO-1", 1000, 5).await;
    app.mock_gateway_success().await;

    let response = app.checkout(cart(product_id, 2)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.webhook(&paid_event(), WEBHOOK_SECRET).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ok"], true);

    let order = app.only_order().await;
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.abacate_status.as_deref(), Some("PAID"));
    assert_eq!(app.points_balance().await, 2);
    assert_eq!(app.ledger_count(PointsReason::EarnOrder).await, 1);

    // Duplicate delivery: acknowledged, zero side effects.
    let response = app.webhook(&paid_event(), WEBHOOK_SECRET).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.points_balance().await, 2);
    assert_eq!(app.ledger_count(PointsReason::EarnOrder).await, 1);
    assert_eq!(app.only_order().await.status, OrderStatus::Paid);
}

#[tokio::test]
async fn paid_webhook_applies_coupon_and_influencer_side_effects() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("PRATO-1", 1000, 5).await;
    let influencer_id = Uuid::new_v4();
    app.seed_coupon("INFLU10", 10, Some(influencer_id)).await;
    app.mock_gateway_success().await;

    let mut payload = cart(product_id, 2);
    payload["couponCode"] = json!("INFLU10");
    let response = app.checkout(payload).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.webhook(&paid_event(), WEBHOOK_SECRET).await;
    assert_eq!(response.status(), StatusCode::OK);

    let coupon_row = coupon::Entity::find()
        .filter(coupon::Column::Code.eq("INFLU10"))
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(coupon_row.used_count, 1);

    let redemptions = coupon_redemption::Entity::find()
        .count(&*app.db)
        .await
        .unwrap();
    assert_eq!(redemptions, 1);

    // 10% of 2000 is a 200-cent discount; 1 influencer point per 10 cents.
    let influencer = influencer_points_account::Entity::find_by_id(influencer_id)
        .one(&*app.db)
        .await
        .unwrap()
        .expect("influencer account");
    assert_eq!(influencer.balance, 20);
}

#[tokio::test]
async fn cancelled_webhook_restores_stock_for_every_item() {
    let app = TestApp::new().await;
    let product_a = app.seed_product("PRATO-1", 1000, 5).await;
    let product_b = app.seed_product("PRATO-2", 500, 5).await;
    app.mock_gateway_success().await;

    let payload = json!({
        "items": [
            { "productId": product_a, "quantity": 1 },
            { "productId": product_b, "quantity": 3 }
        ],
        "delivery": {
            "street": "Rua das Palmeiras",
            "number": "120",
            "district": "Centro",
            "city": "Cascavel",
            "state": "PR",
            "zip": "85800-000"
        }
    });
    let response = app.checkout(payload).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(app.stock_of(product_a).await, 4);
    assert_eq!(app.stock_of(product_b).await, 2);

    let response = app.webhook(&cancelled_event(), WEBHOOK_SECRET).await;
    assert_eq!(response.status(), StatusCode::OK);

    let order = app.only_order().await;
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.abacate_status.as_deref(), Some("CANCELLED"));
    assert_eq!(app.stock_of(product_a).await, 5);
    assert_eq!(app.stock_of(product_b).await, 5);
}

#[tokio::test]
async fn webhook_with_wrong_secret_is_unauthorized() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("PRATO-1", 1000, 5).await;
    app.mock_gateway_success().await;

    let response = app.checkout(cart(product_id, 1)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.webhook(&paid_event(), "whsec_someone_else").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.only_order().await.status, OrderStatus::Pending);
}

#[tokio::test]
async fn webhook_without_billing_id_is_rejected() {
    let app = TestApp::new().await;
    let body = json!({ "type": "billing.paid", "data": {} }).to_string();

    let response = app.webhook(&body, WEBHOOK_SECRET).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "no_billing_id");
}

#[tokio::test]
async fn unknown_event_types_are_acknowledged_without_side_effects() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("PRATO-1", 1000, 5).await;
    app.mock_gateway_success().await;

    let response = app.checkout(cart(product_id, 2)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json!({ "type": "billing.viewed", "data": { "id": BILLING_ID } }).to_string();
    let response = app.webhook(&body, WEBHOOK_SECRET).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ok"], true);
    assert_eq!(app.only_order().await.status, OrderStatus::Pending);
    assert_eq!(app.stock_of(product_id).await, 3);
}

#[tokio::test]
async fn order_listing_returns_items_and_delivery() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("PRATO-1", 1000, 5).await;
    app.mock_gateway_success().await;

    let response = app.checkout(cart(product_id, 2)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let request = Request::builder()
        .method("GET")
        .uri("/orders")
        .header(header::HOST, "cascavel.localhost")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token()))
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body.as_array().map(|orders| orders.len()), Some(1));
    assert_eq!(body[0]["items"][0]["code"], "PRATO-1");
    assert_eq!(body[0]["items"][0]["quantity"], 2);
    assert_eq!(body[0]["delivery"]["city"], "Cascavel");
}

#[tokio::test]
async fn checkout_requires_a_known_tenant() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("PRATO-1", 1000, 5).await;

    let request = Request::builder()
        .method("POST")
        .uri("/orders/checkout")
        .header(header::HOST, "nowhere.localhost")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token()))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(cart(product_id, 1).to_string()))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "store_not_found");
}
