//! Categories and brands. Both are flat name registries: names are
//! lowercase-normalized and unique, and product membership is derived from
//! the foreign keys on `products`.

use crate::entities::{brand, category, Brand, Category};
use crate::errors::ServiceError;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Clone)]
pub struct CategoryService {
    db: Arc<DatabaseConnection>,
}

impl CategoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        name: &str,
        image_url: Option<String>,
    ) -> Result<category::Model, ServiceError> {
        let name = normalize_name(name);
        self.ensure_unique_name(&name).await?;

        let category = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            image_url: Set(image_url),
            created_at: Set(Utc::now()),
        };

        let category = category.insert(&*self.db).await?;
        info!("Created category {}", category.id);
        Ok(category)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<category::Model, ServiceError> {
        Category::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {id} not found")))
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<category::Model>, ServiceError> {
        Category::find()
            .filter(category::Column::Name.eq(normalize_name(name)))
            .one(&*self.db)
            .await
            .map_err(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<category::Model>, ServiceError> {
        Category::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: Uuid,
        name: Option<String>,
        image_url: Option<String>,
    ) -> Result<category::Model, ServiceError> {
        let category = self.get(id).await?;
        let mut active: category::ActiveModel = category.into();

        if let Some(name) = name {
            let name = normalize_name(&name);
            let clashing = Category::find()
                .filter(category::Column::Name.eq(name.clone()))
                .filter(category::Column::Id.ne(id))
                .one(&*self.db)
                .await?;
            if clashing.is_some() {
                return Err(ServiceError::AlreadyExists(format!(
                    "Category {name} already exists"
                )));
            }
            active.name = Set(name);
        }
        if let Some(image_url) = image_url {
            active.image_url = Set(Some(image_url));
        }

        let category = active.update(&*self.db).await?;
        info!("Updated category {}", id);
        Ok(category)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let category = self.get(id).await?;
        category.delete(&*self.db).await?;
        info!("Deleted category {}", id);
        Ok(())
    }

    async fn ensure_unique_name(&self, name: &str) -> Result<(), ServiceError> {
        let existing = Category::find()
            .filter(category::Column::Name.eq(name))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::AlreadyExists(format!(
                "Category {name} already exists"
            )));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct BrandService {
    db: Arc<DatabaseConnection>,
}

impl BrandService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, name: &str) -> Result<brand::Model, ServiceError> {
        let name = normalize_name(name);

        let existing = Brand::find()
            .filter(brand::Column::Name.eq(name.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::AlreadyExists(format!(
                "Brand {name} already exists"
            )));
        }

        let brand = brand::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            created_at: Set(Utc::now()),
        };

        let brand = brand.insert(&*self.db).await?;
        info!("Created brand {}", brand.id);
        Ok(brand)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<brand::Model, ServiceError> {
        Brand::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Brand {id} not found")))
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<brand::Model>, ServiceError> {
        Brand::find()
            .filter(brand::Column::Name.eq(normalize_name(name)))
            .one(&*self.db)
            .await
            .map_err(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<brand::Model>, ServiceError> {
        Brand::find()
            .order_by_asc(brand::Column::Name)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn update(&self, id: Uuid, name: &str) -> Result<brand::Model, ServiceError> {
        let brand = self.get(id).await?;
        let name = normalize_name(name);

        let clashing = Brand::find()
            .filter(brand::Column::Name.eq(name.clone()))
            .filter(brand::Column::Id.ne(id))
            .one(&*self.db)
            .await?;
        if clashing.is_some() {
            return Err(ServiceError::AlreadyExists(format!(
                "Brand {name} already exists"
            )));
        }

        let mut active: brand::ActiveModel = brand.into();
        active.name = Set(name);

        let brand = active.update(&*self.db).await?;
        info!("Updated brand {}", id);
        Ok(brand)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let brand = self.get(id).await?;
        brand.delete(&*self.db).await?;
        info!("Deleted brand {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_normalize_to_lowercase() {
        assert_eq!(normalize_name("  Wine "), "wine");
        assert_eq!(normalize_name("RED"), "red");
        assert_eq!(normalize_name("château"), "château");
    }
}
