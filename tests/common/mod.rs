use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use cellar_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::{product, user},
    handlers::AppServices,
    services::{users::hash_password, PaymentGateway},
    AppState,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password-1";

/// Test harness backed by a throwaway SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    admin_token: String,
    db_file: std::path::PathBuf,
}

impl TestApp {
    /// Fresh application with a dummy payment gateway endpoint.
    pub async fn new() -> Self {
        Self::with_gateway("http://127.0.0.1:1").await
    }

    /// Fresh application pointed at the given gateway base URL.
    pub async fn with_gateway(gateway_url: &str) -> Self {
        Self::build(gateway_url, Some(WEBHOOK_SECRET.to_string())).await
    }

    /// Fresh application with no webhook signing secret configured.
    pub async fn without_webhook_secret(gateway_url: &str) -> Self {
        Self::build(gateway_url, None).await
    }

    async fn build(gateway_url: &str, webhook_secret: Option<String>) -> Self {
        let db_file = std::env::temp_dir().join(format!("cellar_test_{}.db", Uuid::new_v4()));
        let database_url = format!("sqlite://{}?mode=rwc", db_file.display());

        let config = AppConfig {
            database_url,
            jwt_secret: JWT_SECRET.to_string(),
            jwt_expiration_secs: 4 * 24 * 60 * 60,
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            log_level: "warn".to_string(),
            log_json: false,
            auto_migrate: true,
            cors_allowed_origins: None,
            cors_allow_any_origin: true,
            db_max_connections: 1,
            db_min_connections: 1,
            db_connect_timeout_secs: 5,
            db_idle_timeout_secs: 60,
            db_acquire_timeout_secs: 5,
            payment_gateway_url: gateway_url.to_string(),
            payment_secret_key: "sk_test_key".to_string(),
            payment_currency: "usd".to_string(),
            payment_success_url: "http://localhost:3000/success".to_string(),
            payment_cancel_url: "http://localhost:3000/cancel".to_string(),
            payment_webhook_secret: webhook_secret,
            payment_webhook_tolerance_secs: 300,
        };

        let pool = db::establish_connection_from_app_config(&config)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);

        let auth_service = Arc::new(AuthService::new(AuthConfig::new(
            config.jwt_secret.clone(),
            Duration::from_secs(config.jwt_expiration_secs),
        )));

        let gateway = Arc::new(PaymentGateway::from_config(&config));
        let services = AppServices::new(
            db_arc.clone(),
            gateway,
            config.payment_currency.clone(),
        );

        let state = AppState {
            db: db_arc.clone(),
            config,
            auth_service: auth_service.clone(),
            services,
        };

        // Seed an admin account directly; registration never grants the flag.
        let admin = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            full_name: Set("Admin".to_string()),
            email: Set(ADMIN_EMAIL.to_string()),
            password_hash: Set(hash_password(ADMIN_PASSWORD).expect("hash admin password")),
            is_admin: Set(true),
            has_shipping_address: Set(false),
            shipping_first_name: Set(None),
            shipping_last_name: Set(None),
            shipping_address: Set(None),
            shipping_city: Set(None),
            shipping_postal_code: Set(None),
            shipping_province: Set(None),
            shipping_phone: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*db_arc)
        .await
        .expect("seed admin user");

        let admin_token = auth_service
            .generate_token(&admin)
            .expect("issue admin token")
            .token;

        let router = cellar_api::app(state.clone());

        Self {
            router,
            state,
            admin_token,
            db_file,
        }
    }

    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    /// Send a request with an optional bearer token and JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {tok}"));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Send a request with raw bytes and explicit headers (webhook tests).
    pub async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        body: Vec<u8>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = builder.body(Body::from(body)).expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Register a customer account and return their bearer token.
    pub async fn register_and_login(&self, email: &str, password: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/v1/users/register",
                Some(serde_json::json!({
                    "full_name": "Test Customer",
                    "email": email,
                    "password": password,
                })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = self
            .request(
                Method::POST,
                "/api/v1/users/login",
                Some(serde_json::json!({ "email": email, "password": password })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = read_json(response).await;
        body["data"]["token"]
            .as_str()
            .expect("login response carries a token")
            .to_string()
    }

    /// Store a shipping address for the given account.
    pub async fn set_shipping_address(&self, token: &str) {
        let response = self
            .request(
                Method::PUT,
                "/api/v1/users/update/shipping",
                Some(serde_json::json!({
                    "first_name": "Ada",
                    "last_name": "Lovelace",
                    "address": "1 Vineyard Way",
                    "city": "Porto",
                    "postal_code": "4000",
                    "province": "Norte",
                    "phone": "+351000000000",
                })),
                Some(token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    /// Seed a category and brand, then a product under them.
    pub async fn seed_product(&self, name: &str, price: Decimal) -> product::Model {
        if self
            .state
            .services
            .categories
            .find_by_name("red")
            .await
            .expect("category lookup")
            .is_none()
        {
            self.state
                .services
                .categories
                .create("red", None)
                .await
                .expect("seed category");
        }
        if self
            .state
            .services
            .brands
            .find_by_name("douro cellars")
            .await
            .expect("brand lookup")
            .is_none()
        {
            self.state
                .services
                .brands
                .create("douro cellars")
                .await
                .expect("seed brand");
        }

        self.state
            .services
            .catalog
            .create_product(cellar_api::services::catalog::CreateProductInput {
                name: name.to_string(),
                description: "A bottle for tests".to_string(),
                brand: "douro cellars".to_string(),
                category: "red".to_string(),
                sizes: vec!["750ml".to_string()],
                images: vec![],
                origin: Some("Portugal".to_string()),
                price,
                total_qty: 100,
            })
            .await
            .expect("seed product")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_file);
    }
}

/// Decode a response body as JSON.
pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is JSON")
    }
}
