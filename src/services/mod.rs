pub mod catalog;
pub mod coupons;
pub mod orders;
pub mod payments;
pub mod taxonomy;
pub mod users;

pub use catalog::ProductCatalogService;
pub use coupons::CouponService;
pub use orders::OrderService;
pub use payments::PaymentGateway;
pub use taxonomy::{BrandService, CategoryService};
pub use users::UserService;
