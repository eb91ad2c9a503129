//! OpenAPI document assembly for the swagger UI.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::entities::order::OrderStatus;
use crate::errors::ErrorResponse;
use crate::handlers::{brands, categories, coupons, orders, products, users};
use crate::services::catalog::ReviewStats;
use crate::services::orders::SalesStats;
use crate::ApiResponse;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cellar API",
        description = "Wine shop backend: catalog, accounts, coupons, and orders with hosted checkout",
    ),
    paths(
        crate::health_check,
        users::register,
        users::login,
        users::get_profile,
        users::update_shipping,
        products::create_product,
        products::list_products,
        products::get_product,
        products::update_product,
        products::delete_product,
        products::add_review,
        categories::create_category,
        categories::list_categories,
        categories::get_category,
        categories::update_category,
        categories::delete_category,
        brands::create_brand,
        brands::list_brands,
        brands::get_brand,
        brands::update_brand,
        brands::delete_brand,
        coupons::create_coupon,
        coupons::list_coupons,
        coupons::get_coupon,
        coupons::update_coupon,
        coupons::delete_coupon,
        orders::place_order,
        orders::list_orders,
        orders::get_order,
        orders::update_order_status,
        orders::sales_stats,
        crate::handlers::payment_webhooks::payment_webhook,
    ),
    components(schemas(
        ErrorResponse,
        OrderStatus,
        ReviewStats,
        SalesStats,
        users::RegisterRequest,
        users::LoginRequest,
        users::ShippingAddressRequest,
        users::UserResponse,
        users::LoginResponse,
        users::ProfileResponse,
        products::CreateProductRequest,
        products::UpdateProductRequest,
        products::AddReviewRequest,
        products::ProductResponse,
        products::ProductDetailResponse,
        products::ReviewResponse,
        categories::CreateCategoryRequest,
        categories::UpdateCategoryRequest,
        categories::CategoryResponse,
        brands::CreateBrandRequest,
        brands::UpdateBrandRequest,
        brands::BrandResponse,
        coupons::CreateCouponRequest,
        coupons::UpdateCouponRequest,
        coupons::CouponResponse,
        orders::PlaceOrderRequest,
        orders::OrderItemRequest,
        orders::ShippingAddressPayload,
        orders::UpdateOrderStatusRequest,
        orders::OrderResponse,
        orders::OrderItemResponse,
        orders::OrderDetailResponse,
        orders::PlacedOrderResponse,
        ApiResponse<users::UserResponse>,
        ApiResponse<users::LoginResponse>,
        ApiResponse<users::ProfileResponse>,
        ApiResponse<products::ProductResponse>,
        ApiResponse<products::ProductDetailResponse>,
        ApiResponse<products::ReviewResponse>,
        ApiResponse<categories::CategoryResponse>,
        ApiResponse<brands::BrandResponse>,
        ApiResponse<coupons::CouponResponse>,
        ApiResponse<orders::OrderResponse>,
        ApiResponse<orders::OrderDetailResponse>,
        ApiResponse<orders::PlacedOrderResponse>,
        ApiResponse<SalesStats>,
        ApiResponse<Vec<products::ProductResponse>>,
        ApiResponse<Vec<categories::CategoryResponse>>,
        ApiResponse<Vec<brands::BrandResponse>>,
        ApiResponse<Vec<coupons::CouponResponse>>,
        ApiResponse<Vec<orders::OrderResponse>>,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Users", description = "Registration, login, and profiles"),
        (name = "Products", description = "Catalog and reviews"),
        (name = "Categories", description = "Category registry"),
        (name = "Brands", description = "Brand registry"),
        (name = "Coupons", description = "Discount coupons"),
        (name = "Orders", description = "Order placement and fulfillment"),
        (name = "Payments", description = "Gateway webhook"),
        (name = "Health", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn api_docs() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
