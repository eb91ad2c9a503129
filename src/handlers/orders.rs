use crate::auth::{AuthRouterExt, AuthUser};
use crate::entities::{order, order_item};
use crate::handlers::common::{
    created_response, map_service_error, normalize_optional_string, normalize_string,
    success_response, validate_input, PaginatedResponse, PaginationParams,
};
use crate::services::orders::{
    OrderItemInput, PlaceOrderInput, SalesStats, ShippingSnapshot,
};
use crate::{errors::ApiError, ApiResponse, AppState};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub fn orders_routes() -> Router<AppState> {
    let admin = Router::new()
        .route("/update/:id", put(update_order_status))
        .with_admin();

    Router::new()
        .route("/", post(place_order))
        .route("/", get(list_orders))
        .route("/sales/stats", get(sales_stats))
        .route("/:id", get(get_order))
        .with_auth()
        .merge(admin)
}

// validator's length check on `items` serializes the offending value
// into its error, so this needs Serialize.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ShippingAddressPayload {
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

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1))]
    pub items: Vec<OrderItemRequest>,
    #[validate]
    pub shipping: Option<ShippingAddressPayload>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct PlaceOrderQuery {
    /// Coupon code to apply to the order total
    pub coupon: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct OrderListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: order::OrderStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: order::OrderStatus,
    pub total_price: Decimal,
    pub currency: String,
    pub payment_status: String,
    pub payment_method: String,
    pub amount_paid: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl From<order::Model> for OrderResponse {
    fn from(order: order::Model) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            user_id: order.user_id,
            status: order.status,
            total_price: order.total_price,
            currency: order.currency,
            payment_status: order.payment_status,
            payment_method: order.payment_method,
            amount_paid: order.amount_paid,
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl From<order_item::Model> for OrderItemResponse {
    fn from(item: order_item::Model) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            name: item.name,
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlacedOrderResponse {
    pub order: OrderResponse,
    pub items: Vec<OrderItemResponse>,
    /// Hosted checkout page the client should redirect to
    pub checkout_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetailResponse {
    pub order: OrderResponse,
    pub items: Vec<OrderItemResponse>,
}

/// Place an order and open a checkout session
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    params(PlaceOrderQuery),
    request_body = PlaceOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = ApiResponse<PlacedOrderResponse>),
        (status = 400, description = "Invalid order", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway failure", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn place_order(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PlaceOrderQuery>,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let placed = state
        .services
        .orders
        .place_order(
            user.user_id,
            PlaceOrderInput {
                coupon_code: normalize_optional_string(query.coupon),
                items: payload
                    .items
                    .into_iter()
                    .map(|item| OrderItemInput {
                        product_id: item.product_id,
                        quantity: item.quantity,
                    })
                    .collect(),
                shipping: payload.shipping.map(|s| ShippingSnapshot {
                    first_name: normalize_string(s.first_name),
                    last_name: normalize_string(s.last_name),
                    address: normalize_string(s.address),
                    city: normalize_string(s.city),
                    postal_code: normalize_string(s.postal_code),
                    province: normalize_string(s.province),
                    phone: normalize_string(s.phone),
                }),
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::with_message(
        "Order placed",
        PlacedOrderResponse {
            order: OrderResponse::from(placed.order),
            items: placed
                .items
                .into_iter()
                .map(OrderItemResponse::from)
                .collect(),
            checkout_url: placed.checkout_url,
        },
    )))
}

/// List orders. Admins see all orders; everyone else sees their own.
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders", body = ApiResponse<Vec<OrderResponse>>)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let scope = if user.is_admin() {
        None
    } else {
        Some(user.user_id)
    };

    let pagination = PaginationParams {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    };
    let page = pagination.page.max(1);
    let per_page = pagination.limit();

    let (orders, total) = state
        .services
        .orders
        .list_orders(scope, page, per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(
        PaginatedResponse::new(
            orders.into_iter().map(OrderResponse::from).collect(),
            page,
            per_page,
            total,
        ),
    )))
}

/// Fetch one order with its line items
#[utoipa::path(
    get,
    path = "/api/v1/orders/:id",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order", body = ApiResponse<OrderDetailResponse>),
        (status = 403, description = "Not your order", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (order, items) = state
        .services
        .orders
        .get_order(id)
        .await
        .map_err(map_service_error)?;

    if order.user_id != user.user_id && !user.is_admin() {
        return Err(ApiError::ServiceError(crate::errors::ServiceError::Forbidden(
            "You may only view your own orders".to_string(),
        )));
    }

    Ok(success_response(ApiResponse::success(OrderDetailResponse {
        order: OrderResponse::from(order),
        items: items.into_iter().map(OrderItemResponse::from).collect(),
    })))
}

/// Update an order's fulfillment status
#[utoipa::path(
    put,
    path = "/api/v1/orders/update/:id",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .update_status(id, payload.status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::with_message(
        "Order updated",
        OrderResponse::from(order),
    )))
}

/// Aggregate sales figures across all orders
#[utoipa::path(
    get,
    path = "/api/v1/orders/sales/stats",
    responses(
        (status = 200, description = "Sales stats", body = ApiResponse<SalesStats>)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn sales_stats(
    _user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let stats = state
        .services
        .orders
        .sales_stats()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(stats)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_payload_requires_at_least_one_item() {
        let payload = PlaceOrderRequest {
            items: vec![],
            shipping: None,
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn order_payload_with_an_item_passes_validation() {
        let payload = PlaceOrderRequest {
            items: vec![OrderItemRequest {
                product_id: Uuid::new_v4(),
                quantity: 1,
            }],
            shipping: None,
        };
        assert!(payload.validate().is_ok());
    }
}
