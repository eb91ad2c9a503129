use crate::entities::{brand, category, product, review, Brand, Category, Product, Review};
use crate::errors::ServiceError;
use crate::services::taxonomy::normalize_name;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Product catalog: products plus their reviews.
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Clone)]
pub struct CreateProductInput {
    pub name: String,
    pub description: String,
    /// Brand name; must already exist
    pub brand: String,
    /// Category name; must already exist
    pub category: String,
    pub sizes: Vec<String>,
    pub images: Vec<String>,
    pub origin: Option<String>,
    pub price: Decimal,
    pub total_qty: i32,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub sizes: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub origin: Option<String>,
    pub price: Option<Decimal>,
    pub total_qty: Option<i32>,
}

/// Catalog listing filters. String matches are case-insensitive substrings.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub name: Option<String>,
    pub origin: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub size: Option<String>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct ProductPage {
    pub products: Vec<product::Model>,
    pub total: u64,
}

/// Review aggregate derived from the reviews table.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ReviewStats {
    pub total_reviews: u64,
    pub average_rating: Option<Decimal>,
}

pub fn review_stats_from(reviews: &[review::Model]) -> ReviewStats {
    if reviews.is_empty() {
        return ReviewStats {
            total_reviews: 0,
            average_rating: None,
        };
    }

    let sum: i64 = reviews.iter().map(|r| r.rating as i64).sum();
    let average = Decimal::from(sum) / Decimal::from(reviews.len() as i64);
    ReviewStats {
        total_reviews: reviews.len() as u64,
        average_rating: Some(average.round_dp(2)),
    }
}

impl ProductCatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a product. Brand and category are referenced by normalized
    /// name and must already exist.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        self.ensure_unique_name(&input.name, None).await?;

        let brand = self.resolve_brand(&input.brand).await?;
        let category = self.resolve_category(&input.category).await?;

        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            description: Set(input.description),
            brand_id: Set(brand.id),
            category_id: Set(category.id),
            sizes: Set(serde_json::json!(input.sizes)),
            images: Set(serde_json::json!(input.images)),
            origin: Set(input.origin),
            price: Set(input.price),
            total_qty: Set(input.total_qty),
            total_sold: Set(0),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        let product = product.insert(&*self.db).await?;
        info!("Created product {}", product.id);
        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))
    }

    /// List products matching the filter, paged.
    ///
    /// Name, origin, price bounds, and paging are pushed into the query.
    /// Only the size filter inspects the JSON size list after the fetch,
    /// and then pages in memory.
    #[instrument(skip(self, filter))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
        offset: u64,
        limit: u64,
    ) -> Result<ProductPage, ServiceError> {
        let mut query = Product::find();

        if let Some(name) = &filter.name {
            query = query.filter(
                Expr::expr(Func::lower(Expr::col(product::Column::Name)))
                    .like(format!("%{}%", name.to_lowercase())),
            );
        }
        if let Some(origin) = &filter.origin {
            query = query.filter(
                Expr::expr(Func::lower(Expr::col(product::Column::Origin)))
                    .like(format!("%{}%", origin.to_lowercase())),
            );
        }
        if let Some(brand_name) = &filter.brand {
            let brand = self.resolve_brand(brand_name).await?;
            query = query.filter(product::Column::BrandId.eq(brand.id));
        }
        if let Some(category_name) = &filter.category {
            let category = self.resolve_category(category_name).await?;
            query = query.filter(product::Column::CategoryId.eq(category.id));
        }
        if let Some(min) = filter.price_min {
            query = query.filter(product::Column::Price.gte(min));
        }
        if let Some(max) = filter.price_max {
            query = query.filter(product::Column::Price.lte(max));
        }

        let query = query.order_by_desc(product::Column::CreatedAt);

        if let Some(size) = &filter.size {
            let wanted = size.trim().to_lowercase();
            let mut products = query.all(&*self.db).await?;
            products.retain(|p| {
                p.sizes
                    .as_array()
                    .map(|sizes| {
                        sizes
                            .iter()
                            .filter_map(|s| s.as_str())
                            .any(|s| s.to_lowercase() == wanted)
                    })
                    .unwrap_or(false)
            });

            let total = products.len() as u64;
            let products = products
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect();

            return Ok(ProductPage { products, total });
        }

        let total = query.clone().count(&*self.db).await?;
        let products = query.offset(offset).limit(limit).all(&*self.db).await?;

        Ok(ProductPage { products, total })
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        if let Some(ref name) = input.name {
            self.ensure_unique_name(name, Some(product_id)).await?;
        }

        let product = self.get_product(product_id).await?;
        let mut active: product::ActiveModel = product.into();

        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(brand_name) = input.brand {
            let brand = self.resolve_brand(&brand_name).await?;
            active.brand_id = Set(brand.id);
        }
        if let Some(category_name) = input.category {
            let category = self.resolve_category(&category_name).await?;
            active.category_id = Set(category.id);
        }
        if let Some(sizes) = input.sizes {
            active.sizes = Set(serde_json::json!(sizes));
        }
        if let Some(images) = input.images {
            active.images = Set(serde_json::json!(images));
        }
        if let Some(origin) = input.origin {
            active.origin = Set(Some(origin));
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(total_qty) = input.total_qty {
            active.total_qty = Set(total_qty);
        }

        active.updated_at = Set(Some(Utc::now()));

        let product = active.update(&*self.db).await?;
        info!("Updated product {}", product_id);
        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let product = self.get_product(product_id).await?;
        product.delete(&*self.db).await?;
        info!("Deleted product {}", product_id);
        Ok(())
    }

    /// Add a review. A user may review a product only once.
    #[instrument(skip(self, comment))]
    pub async fn add_review(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        rating: i32,
        comment: String,
    ) -> Result<review::Model, ServiceError> {
        if !(1..=5).contains(&rating) {
            return Err(ServiceError::ValidationError(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        // Product must exist before accepting a review for it
        self.get_product(product_id).await?;

        let existing = Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .filter(review::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::AlreadyExists(
                "You have already reviewed this product".to_string(),
            ));
        }

        let review = review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            user_id: Set(user_id),
            rating: Set(rating),
            comment: Set(comment),
            created_at: Set(Utc::now()),
        };

        let review = review.insert(&*self.db).await?;
        info!("Added review {} for product {}", review.id, product_id);
        Ok(review)
    }

    #[instrument(skip(self))]
    pub async fn review_stats(&self, product_id: Uuid) -> Result<ReviewStats, ServiceError> {
        let reviews = Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .all(&*self.db)
            .await?;
        Ok(review_stats_from(&reviews))
    }

    async fn ensure_unique_name(
        &self,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut query = Product::find().filter(product::Column::Name.eq(name));
        if let Some(id) = exclude {
            query = query.filter(product::Column::Id.ne(id));
        }
        if query.one(&*self.db).await?.is_some() {
            return Err(ServiceError::AlreadyExists(format!(
                "Product {name} already exists"
            )));
        }
        Ok(())
    }

    async fn resolve_brand(&self, name: &str) -> Result<brand::Model, ServiceError> {
        Brand::find()
            .filter(brand::Column::Name.eq(normalize_name(name)))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Brand {name} not found")))
    }

    async fn resolve_category(&self, name: &str) -> Result<category::Model, ServiceError> {
        Category::find()
            .filter(category::Column::Name.eq(normalize_name(name)))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {name} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn review(rating: i32) -> review::Model {
        review::Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            rating,
            comment: "fine".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn review_stats_empty() {
        let stats = review_stats_from(&[]);
        assert_eq!(stats.total_reviews, 0);
        assert_eq!(stats.average_rating, None);
    }

    #[test]
    fn review_stats_averages_ratings() {
        let stats = review_stats_from(&[review(4), review(5), review(3)]);
        assert_eq!(stats.total_reviews, 3);
        assert_eq!(stats.average_rating, Some(dec!(4.00)));
    }

    #[test]
    fn review_stats_rounds_to_two_places() {
        let stats = review_stats_from(&[review(5), review(4)]);
        assert_eq!(stats.average_rating, Some(dec!(4.50)));
    }
}
