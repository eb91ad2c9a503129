pub mod brands;
pub mod categories;
pub mod common;
pub mod coupons;
pub mod orders;
pub mod payment_webhooks;
pub mod products;
pub mod users;

use crate::services::{
    BrandService, CategoryService, CouponService, OrderService, PaymentGateway,
    ProductCatalogService, UserService,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// All domain services, one instance each, shared through [`crate::AppState`].
#[derive(Clone)]
pub struct AppServices {
    pub users: UserService,
    pub catalog: ProductCatalogService,
    pub categories: CategoryService,
    pub brands: BrandService,
    pub coupons: CouponService,
    pub orders: OrderService,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<PaymentGateway>,
        currency: String,
    ) -> Self {
        Self {
            users: UserService::new(db.clone()),
            catalog: ProductCatalogService::new(db.clone()),
            categories: CategoryService::new(db.clone()),
            brands: BrandService::new(db.clone()),
            coupons: CouponService::new(db.clone()),
            orders: OrderService::new(db, gateway, currency),
        }
    }
}
