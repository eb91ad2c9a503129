pub mod brand;
pub mod category;
pub mod coupon;
pub mod order;
pub mod order_item;
pub mod product;
pub mod review;
pub mod user;

pub use brand::Entity as Brand;
pub use category::Entity as Category;
pub use coupon::Entity as Coupon;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use product::Entity as Product;
pub use review::Entity as Review;
pub use user::Entity as User;
