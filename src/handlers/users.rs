use crate::auth::{AuthRouterExt, AuthUser};
use crate::entities::user;
use crate::handlers::common::{
    created_response, map_service_error, normalize_string, success_response, validate_input,
};
use crate::handlers::orders::OrderResponse;
use crate::services::users::{RegisterInput, ShippingAddressInput};
use crate::{errors::ApiError, ApiResponse, AppState};
use axum::{
    extract::{Json, State},
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub fn users_routes() -> Router<AppState> {
    let protected = Router::new()
        .route("/profile", get(get_profile))
        .route("/update/shipping", put(update_shipping))
        .with_auth();

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .merge(protected)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ShippingAddressRequest {
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    #[validate(length(min = 1))]
    pub address: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub postal_code: String,
    #[validate(length(min = 1))]
    pub province: String,
    #[validate(length(min = 1))]
    pub phone: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub is_admin: bool,
    pub has_shipping_address: bool,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
            is_admin: user.is_admin,
            has_shipping_address: user.has_shipping_address,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user: UserResponse,
    pub orders: Vec<OrderResponse>,
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/v1/users/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let full_name = normalize_string(payload.full_name);
    if full_name.is_empty() {
        return Err(ApiError::ValidationError(
            "Full name cannot be blank".to_string(),
        ));
    }

    let user = state
        .services
        .users
        .register(RegisterInput {
            full_name,
            email: payload.email,
            password: payload.password,
        })
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::with_message(
        "User registered",
        UserResponse::from(user),
    )))
}

/// Log in and receive a session token
#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let user = state
        .services
        .users
        .authenticate(&payload.email, &payload.password)
        .await
        .map_err(map_service_error)?;

    let issued = state
        .auth_service
        .generate_token(&user)
        .map_err(|_| ApiError::ServiceError(crate::errors::ServiceError::InternalError(
            "token issuance failed".to_string(),
        )))?;

    Ok(success_response(ApiResponse::with_message(
        "Login successful",
        LoginResponse {
            token: issued.token,
            token_type: issued.token_type,
            expires_in: issued.expires_in,
            user: UserResponse::from(user),
        },
    )))
}

/// Fetch the authenticated user's profile with their orders
#[utoipa::path(
    get,
    path = "/api/v1/users/profile",
    responses(
        (status = 200, description = "Profile", body = ApiResponse<ProfileResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn get_profile(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (account, orders) = state
        .services
        .users
        .get_profile(user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(ProfileResponse {
        user: UserResponse::from(account),
        orders: orders.into_iter().map(OrderResponse::from).collect(),
    })))
}

/// Store the authenticated user's shipping address
#[utoipa::path(
    put,
    path = "/api/v1/users/update/shipping",
    request_body = ShippingAddressRequest,
    responses(
        (status = 200, description = "Shipping address updated", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn update_shipping(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ShippingAddressRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let updated = state
        .services
        .users
        .update_shipping_address(
            user.user_id,
            ShippingAddressInput {
                first_name: normalize_string(payload.first_name),
                last_name: normalize_string(payload.last_name),
                address: normalize_string(payload.address),
                city: normalize_string(payload.city),
                postal_code: normalize_string(payload.postal_code),
                province: normalize_string(payload.province),
                phone: normalize_string(payload.phone),
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::with_message(
        "Shipping address updated",
        UserResponse::from(updated),
    )))
}
