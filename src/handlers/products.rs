use crate::auth::{AuthRouterExt, AuthUser};
use crate::entities::{product, review};
use crate::handlers::common::{
    created_response, map_service_error, no_content_response, normalize_optional_string,
    normalize_string, success_response, validate_input, PaginatedResponse, PaginationParams,
};
use crate::services::catalog::{
    CreateProductInput, ProductFilter, ReviewStats, UpdateProductInput,
};
use crate::{errors::ApiError, ApiResponse, AppState};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub fn products_routes() -> Router<AppState> {
    let admin = Router::new()
        .route("/", post(create_product))
        .route("/:id", put(update_product))
        .route("/:id", delete(delete_product))
        .with_admin();

    let reviews = Router::new()
        .route("/:id/reviews", post(add_review))
        .with_auth();

    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
        .merge(reviews)
        .merge(admin)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 160))]
    pub name: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(length(min = 1))]
    pub brand: String,
    #[validate(length(min = 1))]
    pub category: String,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub origin: Option<String>,
    pub price: Decimal,
    #[validate(range(min = 0))]
    pub total_qty: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 160))]
    pub name: Option<String>,
    #[validate(length(min = 1))]
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub sizes: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub origin: Option<String>,
    pub price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub total_qty: Option<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddReviewRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(min = 1, max = 2000))]
    pub comment: String,
}

/// Catalog listing filters. `price` takes a `min-max` range, either bound
/// optional, e.g. `10-50`, `10-`, `-50`.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ProductListQuery {
    pub name: Option<String>,
    pub origin: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub size: Option<String>,
    pub price: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub brand_id: Uuid,
    pub category_id: Uuid,
    pub sizes: serde_json::Value,
    pub images: serde_json::Value,
    pub origin: Option<String>,
    pub price: Decimal,
    pub total_qty: i32,
    pub total_sold: i32,
    pub qty_left: i32,
    pub created_at: DateTime<Utc>,
}

impl From<product::Model> for ProductResponse {
    fn from(product: product::Model) -> Self {
        let qty_left = product.qty_left();
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            brand_id: product.brand_id,
            category_id: product.category_id,
            sizes: product.sizes,
            images: product.images,
            origin: product.origin,
            price: product.price,
            total_qty: product.total_qty,
            total_sold: product.total_sold,
            qty_left,
            created_at: product.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl From<review::Model> for ReviewResponse {
    fn from(review: review::Model) -> Self {
        Self {
            id: review.id,
            product_id: review.product_id,
            user_id: review.user_id,
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductDetailResponse {
    pub product: ProductResponse,
    pub reviews: ReviewStats,
}

/// Parse a `min-max` price range; either bound may be absent.
fn parse_price_range(raw: &str) -> Result<(Option<Decimal>, Option<Decimal>), ApiError> {
    let parse = |part: &str| -> Result<Option<Decimal>, ApiError> {
        let part = part.trim();
        if part.is_empty() {
            return Ok(None);
        }
        part.parse::<Decimal>().map(Some).map_err(|_| {
            ApiError::ValidationError(format!("Invalid price bound: {part}"))
        })
    };

    match raw.split_once('-') {
        Some((min, max)) => Ok((parse(min)?, parse(max)?)),
        None => {
            let exact = parse(raw)?;
            Ok((exact, exact))
        }
    }
}

/// Create a product
#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Brand or category missing", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already taken", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .create_product(CreateProductInput {
            name: normalize_string(payload.name),
            description: payload.description,
            brand: payload.brand,
            category: payload.category,
            sizes: payload.sizes,
            images: payload.images,
            origin: normalize_optional_string(payload.origin),
            price: payload.price,
            total_qty: payload.total_qty,
        })
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::with_message(
        "Product created",
        ProductResponse::from(product),
    )))
}

/// List products, filtered and paged
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Products", body = ApiResponse<Vec<ProductResponse>>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (price_min, price_max) = match &query.price {
        Some(raw) => parse_price_range(raw)?,
        None => (None, None),
    };

    let pagination = PaginationParams {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    };
    let page = pagination.page.max(1);
    let per_page = pagination.limit();

    let result = state
        .services
        .catalog
        .list_products(
            ProductFilter {
                name: normalize_optional_string(query.name),
                origin: normalize_optional_string(query.origin),
                brand: normalize_optional_string(query.brand),
                category: normalize_optional_string(query.category),
                size: normalize_optional_string(query.size),
                price_min,
                price_max,
            },
            pagination.offset(),
            per_page,
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(
        PaginatedResponse::new(
            result
                .products
                .into_iter()
                .map(ProductResponse::from)
                .collect(),
            page,
            per_page,
            result.total,
        ),
    )))
}

/// Fetch a product with its review aggregate
#[utoipa::path(
    get,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<ProductDetailResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .get_product(id)
        .await
        .map_err(map_service_error)?;

    let reviews = state
        .services
        .catalog
        .review_stats(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(
        ProductDetailResponse {
            product: ProductResponse::from(product),
            reviews,
        },
    )))
}

/// Update a product
#[utoipa::path(
    put,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .update_product(
            id,
            UpdateProductInput {
                name: normalize_optional_string(payload.name),
                description: payload.description,
                brand: normalize_optional_string(payload.brand),
                category: normalize_optional_string(payload.category),
                sizes: payload.sizes,
                images: payload.images,
                origin: normalize_optional_string(payload.origin),
                price: payload.price,
                total_qty: payload.total_qty,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::with_message(
        "Product updated",
        ProductResponse::from(product),
    )))
}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .catalog
        .delete_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

/// Review a product. One review per user per product.
#[utoipa::path(
    post,
    path = "/api/v1/products/:id/reviews",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = AddReviewRequest,
    responses(
        (status = 201, description = "Review added", body = ApiResponse<ReviewResponse>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already reviewed", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn add_review(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddReviewRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let review = state
        .services
        .catalog
        .add_review(id, user.user_id, payload.rating, payload.comment)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::with_message(
        "Review added",
        ReviewResponse::from(review),
    )))
}
