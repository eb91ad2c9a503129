use crate::auth::AuthRouterExt;
use crate::entities::brand;
use crate::handlers::common::{
    created_response, map_service_error, no_content_response, normalize_string, success_response,
    validate_input,
};
use crate::{errors::ApiError, ApiResponse, AppState};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub fn brands_routes() -> Router<AppState> {
    let protected = Router::new()
        .route("/", post(create_brand))
        .route("/:id", put(update_brand))
        .route("/:id", delete(delete_brand))
        .with_admin();

    Router::new()
        .route("/", get(list_brands))
        .route("/:id", get(get_brand))
        .merge(protected)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBrandRequest {
    #[validate(length(min = 1, max = 80))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBrandRequest {
    #[validate(length(min = 1, max = 80))]
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BrandResponse {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<brand::Model> for BrandResponse {
    fn from(brand: brand::Model) -> Self {
        Self {
            id: brand.id,
            name: brand.name,
            created_at: brand.created_at,
        }
    }
}

/// Create a brand
#[utoipa::path(
    post,
    path = "/api/v1/brands",
    request_body = CreateBrandRequest,
    responses(
        (status = 201, description = "Brand created", body = ApiResponse<BrandResponse>),
        (status = 409, description = "Name already taken", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Brands"
)]
pub async fn create_brand(
    State(state): State<AppState>,
    Json(payload): Json<CreateBrandRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let name = normalize_string(payload.name);
    if name.is_empty() {
        return Err(ApiError::ValidationError(
            "Brand name cannot be blank".to_string(),
        ));
    }

    let brand = state
        .services
        .brands
        .create(&name)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::with_message(
        "Brand created",
        BrandResponse::from(brand),
    )))
}

/// List all brands
#[utoipa::path(
    get,
    path = "/api/v1/brands",
    responses(
        (status = 200, description = "Brands", body = ApiResponse<Vec<BrandResponse>>)
    ),
    tag = "Brands"
)]
pub async fn list_brands(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let brands = state
        .services
        .brands
        .list()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(
        brands
            .into_iter()
            .map(BrandResponse::from)
            .collect::<Vec<_>>(),
    )))
}

/// Fetch a brand
#[utoipa::path(
    get,
    path = "/api/v1/brands/:id",
    params(("id" = Uuid, Path, description = "Brand ID")),
    responses(
        (status = 200, description = "Brand", body = ApiResponse<BrandResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Brands"
)]
pub async fn get_brand(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let brand = state
        .services
        .brands
        .get(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(BrandResponse::from(
        brand,
    ))))
}

/// Rename a brand
#[utoipa::path(
    put,
    path = "/api/v1/brands/:id",
    params(("id" = Uuid, Path, description = "Brand ID")),
    request_body = UpdateBrandRequest,
    responses(
        (status = 200, description = "Brand updated", body = ApiResponse<BrandResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Brands"
)]
pub async fn update_brand(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBrandRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let brand = state
        .services
        .brands
        .update(id, &normalize_string(payload.name))
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::with_message(
        "Brand updated",
        BrandResponse::from(brand),
    )))
}

/// Delete a brand
#[utoipa::path(
    delete,
    path = "/api/v1/brands/:id",
    params(("id" = Uuid, Path, description = "Brand ID")),
    responses(
        (status = 204, description = "Brand deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Brands"
)]
pub async fn delete_brand(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .brands
        .delete(id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}
