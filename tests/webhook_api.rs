mod common;

use axum::http::{Method, StatusCode};
use cellar_api::handlers::payment_webhooks::sign_payload;
use common::{read_json, TestApp, WEBHOOK_SECRET};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn app_with_order() -> (MockServer, TestApp, Uuid) {
    let server = MockServer::start().await;
    let app = TestApp::with_gateway(&server.uri()).await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_123",
            "url": "https://checkout.example.com/cs_test_123",
        })))
        .mount(&server)
        .await;

    let product = app.seed_product("Paid Bottle", dec!(18.00)).await;
    let token = app
        .register_and_login("payer@example.com", "long-enough-pw")
        .await;
    app.set_shipping_address(&token).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "items": [ { "product_id": product.id, "quantity": 2 } ] })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order_id = read_json(response).await["data"]["order"]["id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    (server, app, order_id)
}

fn completed_event(order_id: Uuid) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_123",
            "payment_status": "paid",
            "payment_method_types": ["card"],
            "currency": "usd",
            "amount_total": 3600,
            "metadata": { "order_id": order_id.to_string() },
        }},
    }))
    .unwrap()
}

async fn deliver(app: &TestApp, body: Vec<u8>) -> axum::response::Response {
    let signature = sign_payload(WEBHOOK_SECRET, chrono::Utc::now().timestamp(), &body);
    app.request_raw(
        Method::POST,
        "/webhook",
        body,
        &[
            ("content-type", "application/json"),
            ("Stripe-Signature", &signature),
        ],
    )
    .await
}

#[tokio::test]
async fn completed_checkout_settles_the_order() {
    let (_server, app, order_id) = app_with_order().await;

    let response = deliver(&app, completed_event(order_id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let (order, _) = app
        .state
        .services
        .orders
        .get_order(order_id)
        .await
        .expect("reload order");
    assert_eq!(order.payment_status, "paid");
    assert_eq!(order.payment_method, "card");
    assert_eq!(order.amount_paid, Some(Decimal::from(36)));
}

#[tokio::test]
async fn redelivery_is_idempotent() {
    let (_server, app, order_id) = app_with_order().await;

    let response = deliver(&app, completed_event(order_id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = deliver(&app, completed_event(order_id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let (order, _) = app
        .state
        .services
        .orders
        .get_order(order_id)
        .await
        .expect("reload order");
    assert_eq!(order.payment_status, "paid");
    assert_eq!(order.amount_paid, Some(Decimal::from(36)));
}

#[tokio::test]
async fn bad_signature_is_rejected_without_state_change() {
    let (_server, app, order_id) = app_with_order().await;

    let body = completed_event(order_id);
    let signature = sign_payload("whsec_wrong_secret", chrono::Utc::now().timestamp(), &body);
    let response = app
        .request_raw(
            Method::POST,
            "/webhook",
            body,
            &[
                ("content-type", "application/json"),
                ("Stripe-Signature", &signature),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (order, _) = app
        .state
        .services
        .orders
        .get_order(order_id)
        .await
        .expect("reload order");
    assert_eq!(order.payment_status, "pending");
}

#[tokio::test]
async fn deliveries_are_rejected_when_no_secret_is_configured() {
    let server = MockServer::start().await;
    let app = TestApp::without_webhook_secret(&server.uri()).await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_123",
            "url": "https://checkout.example.com/cs_test_123",
        })))
        .mount(&server)
        .await;

    let product = app.seed_product("Unsettled Bottle", dec!(18.00)).await;
    let token = app
        .register_and_login("unsettled@example.com", "long-enough-pw")
        .await;
    app.set_shipping_address(&token).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "items": [ { "product_id": product.id, "quantity": 2 } ] })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order_id: Uuid = read_json(response).await["data"]["order"]["id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    // Even a correctly signed event cannot settle anything
    let response = deliver(&app, completed_event(order_id)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (order, _) = app
        .state
        .services
        .orders
        .get_order(order_id)
        .await
        .expect("reload order");
    assert_eq!(order.payment_status, "pending");
}

#[tokio::test]
async fn missing_signature_is_rejected() {
    let (_server, app, order_id) = app_with_order().await;

    let response = app
        .request_raw(
            Method::POST,
            "/webhook",
            completed_event(order_id),
            &[("content-type", "application/json")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_order_is_acknowledged_and_ignored() {
    let (_server, app, _order_id) = app_with_order().await;

    let response = deliver(&app, completed_event(Uuid::new_v4())).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn other_event_types_are_acknowledged_without_changes() {
    let (_server, app, order_id) = app_with_order().await;

    let body = serde_json::to_vec(&json!({
        "id": "evt_2",
        "type": "checkout.session.expired",
        "data": { "object": {
            "id": "cs_test_123",
            "metadata": { "order_id": order_id.to_string() },
        }},
    }))
    .unwrap();

    let response = deliver(&app, body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let (order, _) = app
        .state
        .services
        .orders
        .get_order(order_id)
        .await
        .expect("reload order");
    assert_eq!(order.payment_status, "pending");
}

#[tokio::test]
async fn malformed_payload_is_a_bad_request() {
    let (_server, app, _order_id) = app_with_order().await;

    let response = deliver(&app, b"not json".to_vec()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
