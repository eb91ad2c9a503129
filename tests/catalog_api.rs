mod common;

use axum::http::{Method, StatusCode};
use common::{read_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn category_names_are_unique_case_insensitively() {
    let app = TestApp::new().await;
    let admin = app.admin_token().to_string();

    let response = app
        .request(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": "Wine" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["data"]["name"], "wine");

    let response = app
        .request(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": "  wine " })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn category_mutations_require_admin() {
    let app = TestApp::new().await;
    let customer = app
        .register_and_login("customer@example.com", "long-enough-pw")
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": "white" })),
            Some(&customer),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": "white" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn brand_duplicates_conflict() {
    let app = TestApp::new().await;
    let admin = app.admin_token().to_string();

    let response = app
        .request(
            Method::POST,
            "/api/v1/brands",
            Some(json!({ "name": "Quinta Nova" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request(
            Method::POST,
            "/api/v1/brands",
            Some(json!({ "name": "QUINTA NOVA" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn product_requires_existing_brand_and_category() {
    let app = TestApp::new().await;
    let admin = app.admin_token().to_string();

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "Lost Bottle",
                "description": "No home for this one",
                "brand": "missing brand",
                "category": "missing category",
                "sizes": ["750ml"],
                "images": [],
                "price": "19.90",
                "total_qty": 10,
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn product_listing_filters_by_name_price_and_size() {
    let app = TestApp::new().await;
    app.seed_product("Douro Reserva", dec!(25.00)).await;
    app.seed_product("Vinho Verde", dec!(8.50)).await;

    let response = app
        .request(Method::GET, "/api/v1/products?name=douro", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let products = body["data"]["data"].as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["name"], "Douro Reserva");

    let response = app
        .request(Method::GET, "/api/v1/products?price=10-30", None, None)
        .await;
    let body = read_json(response).await;
    assert_eq!(body["data"]["data"].as_array().unwrap().len(), 1);

    let response = app
        .request(Method::GET, "/api/v1/products?size=750ML", None, None)
        .await;
    let body = read_json(response).await;
    assert_eq!(body["data"]["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["pagination"]["total"], 2);
}

#[tokio::test]
async fn product_listing_pages_without_filters() {
    let app = TestApp::new().await;
    app.seed_product("Bottle One", dec!(10.00)).await;
    app.seed_product("Bottle Two", dec!(11.00)).await;
    app.seed_product("Bottle Three", dec!(12.00)).await;

    let response = app
        .request(Method::GET, "/api/v1/products?page=1&per_page=2", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["pagination"]["total"], 3);

    let response = app
        .request(Method::GET, "/api/v1/products?page=2&per_page=2", None, None)
        .await;
    let body = read_json(response).await;
    assert_eq!(body["data"]["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["pagination"]["total"], 3);
}

#[tokio::test]
async fn product_update_and_delete_round_trip() {
    let app = TestApp::new().await;
    let admin = app.admin_token().to_string();
    let product = app.seed_product("Old Label", dec!(12.00)).await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{}", product.id),
            Some(json!({ "name": "New Label", "price": "14.00" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["name"], "New Label");

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/products/{}", product.id),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{}", product.id),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn one_review_per_user_and_stats_average() {
    let app = TestApp::new().await;
    let product = app.seed_product("Rated Bottle", dec!(18.00)).await;
    let alice = app
        .register_and_login("alice@example.com", "long-enough-pw")
        .await;
    let bob = app
        .register_and_login("bob@example.com", "long-enough-pw")
        .await;

    let uri = format!("/api/v1/products/{}/reviews", product.id);

    let response = app
        .request(
            Method::POST,
            &uri,
            Some(json!({ "rating": 5, "comment": "Excellent" })),
            Some(&alice),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request(
            Method::POST,
            &uri,
            Some(json!({ "rating": 4, "comment": "Solid" })),
            Some(&bob),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // Second review from the same account is rejected
    let response = app
        .request(
            Method::POST,
            &uri,
            Some(json!({ "rating": 1, "comment": "Changed my mind" })),
            Some(&alice),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{}", product.id),
            None,
            None,
        )
        .await;
    let body = read_json(response).await;
    assert_eq!(body["data"]["reviews"]["total_reviews"], 2);
    assert_eq!(body["data"]["reviews"]["average_rating"], "4.50");
}

#[tokio::test]
async fn review_rating_is_bounded() {
    let app = TestApp::new().await;
    let product = app.seed_product("Strict Bottle", dec!(18.00)).await;
    let token = app
        .register_and_login("strict@example.com", "long-enough-pw")
        .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/products/{}/reviews", product.id),
            Some(json!({ "rating": 6, "comment": "Too good" })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
