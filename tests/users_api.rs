mod common;

use axum::http::{Method, StatusCode};
use common::{read_json, TestApp, JWT_SECRET};
use serde_json::json;

#[tokio::test]
async fn register_creates_account() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/users/register",
            Some(json!({
                "full_name": "Maria Silva",
                "email": "Maria@Example.com",
                "password": "long-enough-pw",
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    // Emails are stored lowercase
    assert_eq!(body["data"]["email"], "maria@example.com");
    assert_eq!(body["data"]["is_admin"], false);
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = TestApp::new().await;
    app.register_and_login("dup@example.com", "long-enough-pw")
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/users/register",
            Some(json!({
                "full_name": "Second",
                "email": "DUP@example.com",
                "password": "long-enough-pw",
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = TestApp::new().await;
    app.register_and_login("who@example.com", "long-enough-pw")
        .await;

    let wrong_password = app
        .request(
            Method::POST,
            "/api/v1/users/login",
            Some(json!({ "email": "who@example.com", "password": "not-the-password" })),
            None,
        )
        .await;
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    let wrong_password = read_json(wrong_password).await;

    let unknown_email = app
        .request(
            Method::POST,
            "/api/v1/users/login",
            Some(json!({ "email": "nobody@example.com", "password": "whatever-pw" })),
            None,
        )
        .await;
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    let unknown_email = read_json(unknown_email).await;

    assert_eq!(wrong_password["message"], unknown_email["message"]);
}

#[tokio::test]
async fn tokens_are_valid_for_four_days() {
    let app = TestApp::new().await;
    let token = app
        .register_and_login("fourdays@example.com", "long-enough-pw")
        .await;

    let claims = jsonwebtoken::decode::<serde_json::Value>(
        &token,
        &jsonwebtoken::DecodingKey::from_secret(JWT_SECRET.as_bytes()),
        &jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256),
    )
    .expect("decode issued token")
    .claims;

    let lifetime = claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap();
    assert_eq!(lifetime, 4 * 24 * 60 * 60);
    assert_eq!(claims["email"], "fourdays@example.com");
}

#[tokio::test]
async fn profile_requires_authentication() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/users/profile", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_returns_account_and_orders() {
    let app = TestApp::new().await;
    let token = app
        .register_and_login("profile@example.com", "long-enough-pw")
        .await;

    let response = app
        .request(Method::GET, "/api/v1/users/profile", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["data"]["user"]["email"], "profile@example.com");
    assert_eq!(body["data"]["orders"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn shipping_address_flips_the_flag() {
    let app = TestApp::new().await;
    let token = app
        .register_and_login("shipper@example.com", "long-enough-pw")
        .await;

    app.set_shipping_address(&token).await;

    let response = app
        .request(Method::GET, "/api/v1/users/profile", None, Some(&token))
        .await;
    let body = read_json(response).await;
    assert_eq!(body["data"]["user"]["has_shipping_address"], true);
}
