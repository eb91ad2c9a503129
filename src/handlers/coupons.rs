use crate::auth::AuthRouterExt;
use crate::entities::coupon;
use crate::handlers::common::{
    created_response, map_service_error, no_content_response, normalize_optional_string,
    normalize_string, success_response, validate_input,
};
use crate::{errors::ApiError, ApiResponse, AppState};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub fn coupons_routes() -> Router<AppState> {
    let admin = Router::new()
        .route("/", post(create_coupon))
        .route("/", get(list_coupons))
        .route("/:id", get(get_coupon))
        .route("/update/:id", put(update_coupon))
        .route("/delete/:id", delete(delete_coupon))
        .with_admin();

    Router::new().merge(admin)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCouponRequest {
    #[validate(length(min = 1, max = 40))]
    pub code: String,
    pub discount: Decimal,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCouponRequest {
    #[validate(length(min = 1, max = 40))]
    pub code: Option<String>,
    pub discount: Option<Decimal>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CouponResponse {
    pub id: Uuid,
    pub code: String,
    pub discount: Decimal,
    pub expires_at: DateTime<Utc>,
    pub is_expired: bool,
    pub days_left: i64,
    pub created_at: DateTime<Utc>,
}

impl From<coupon::Model> for CouponResponse {
    fn from(coupon: coupon::Model) -> Self {
        let is_expired = coupon.is_expired();
        let days_left = coupon.days_left();
        Self {
            id: coupon.id,
            code: coupon.code,
            discount: coupon.discount,
            expires_at: coupon.expires_at,
            is_expired,
            days_left,
            created_at: coupon.created_at,
        }
    }
}

/// Create a coupon
#[utoipa::path(
    post,
    path = "/api/v1/coupons",
    request_body = CreateCouponRequest,
    responses(
        (status = 201, description = "Coupon created", body = ApiResponse<CouponResponse>),
        (status = 400, description = "Discount out of range", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already taken", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Coupons"
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    Json(payload): Json<CreateCouponRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let coupon = state
        .services
        .coupons
        .create(
            &normalize_string(payload.code),
            payload.discount,
            payload.expires_at,
        )
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::with_message(
        "Coupon created",
        CouponResponse::from(coupon),
    )))
}

/// List all coupons
#[utoipa::path(
    get,
    path = "/api/v1/coupons",
    responses(
        (status = 200, description = "Coupons", body = ApiResponse<Vec<CouponResponse>>)
    ),
    security(("Bearer" = [])),
    tag = "Coupons"
)]
pub async fn list_coupons(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let coupons = state
        .services
        .coupons
        .list()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(
        coupons
            .into_iter()
            .map(CouponResponse::from)
            .collect::<Vec<_>>(),
    )))
}

/// Fetch a coupon
#[utoipa::path(
    get,
    path = "/api/v1/coupons/:id",
    params(("id" = Uuid, Path, description = "Coupon ID")),
    responses(
        (status = 200, description = "Coupon", body = ApiResponse<CouponResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Coupons"
)]
pub async fn get_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let coupon = state
        .services
        .coupons
        .get(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(CouponResponse::from(
        coupon,
    ))))
}

/// Update a coupon
#[utoipa::path(
    put,
    path = "/api/v1/coupons/update/:id",
    params(("id" = Uuid, Path, description = "Coupon ID")),
    request_body = UpdateCouponRequest,
    responses(
        (status = 200, description = "Coupon updated", body = ApiResponse<CouponResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Coupons"
)]
pub async fn update_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCouponRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let coupon = state
        .services
        .coupons
        .update(
            id,
            normalize_optional_string(payload.code),
            payload.discount,
            payload.expires_at,
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::with_message(
        "Coupon updated",
        CouponResponse::from(coupon),
    )))
}

/// Delete a coupon
#[utoipa::path(
    delete,
    path = "/api/v1/coupons/delete/:id",
    params(("id" = Uuid, Path, description = "Coupon ID")),
    responses(
        (status = 204, description = "Coupon deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Coupons"
)]
pub async fn delete_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .coupons
        .delete(id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}
