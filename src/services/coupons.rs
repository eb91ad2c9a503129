use crate::entities::{coupon, Coupon};
use crate::errors::ServiceError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Coupons are keyed by uppercase-normalized unique code.
#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn ensure_discount_range(discount: Decimal) -> Result<(), ServiceError> {
    if discount < Decimal::ZERO || discount > Decimal::from(100) {
        return Err(ServiceError::ValidationError(
            "Discount must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        code: &str,
        discount: Decimal,
        expires_at: DateTime<Utc>,
    ) -> Result<coupon::Model, ServiceError> {
        ensure_discount_range(discount)?;
        let code = normalize_code(code);

        let existing = Coupon::find()
            .filter(coupon::Column::Code.eq(code.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::AlreadyExists(format!(
                "Coupon {code} already exists"
            )));
        }

        let coupon = coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            discount: Set(discount),
            expires_at: Set(expires_at),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        let coupon = coupon.insert(&*self.db).await?;
        info!("Created coupon {}", coupon.id);
        Ok(coupon)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<coupon::Model, ServiceError> {
        Coupon::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {id} not found")))
    }

    /// Look up a coupon by code (normalized). `None` when unknown.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<coupon::Model>, ServiceError> {
        Coupon::find()
            .filter(coupon::Column::Code.eq(normalize_code(code)))
            .one(&*self.db)
            .await
            .map_err(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<coupon::Model>, ServiceError> {
        Coupon::find()
            .order_by_desc(coupon::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: Uuid,
        code: Option<String>,
        discount: Option<Decimal>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<coupon::Model, ServiceError> {
        let coupon = self.get(id).await?;
        let mut active: coupon::ActiveModel = coupon.into();

        if let Some(code) = code {
            let code = normalize_code(&code);
            let clashing = Coupon::find()
                .filter(coupon::Column::Code.eq(code.clone()))
                .filter(coupon::Column::Id.ne(id))
                .one(&*self.db)
                .await?;
            if clashing.is_some() {
                return Err(ServiceError::AlreadyExists(format!(
                    "Coupon {code} already exists"
                )));
            }
            active.code = Set(code);
        }
        if let Some(discount) = discount {
            ensure_discount_range(discount)?;
            active.discount = Set(discount);
        }
        if let Some(expires_at) = expires_at {
            active.expires_at = Set(expires_at);
        }

        active.updated_at = Set(Some(Utc::now()));

        let coupon = active.update(&*self.db).await?;
        info!("Updated coupon {}", id);
        Ok(coupon)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let coupon = self.get(id).await?;
        coupon.delete(&*self.db).await?;
        info!("Deleted coupon {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn codes_normalize_to_uppercase() {
        assert_eq!(normalize_code(" summer10 "), "SUMMER10");
        assert_eq!(normalize_code("Mix3dCase"), "MIX3DCASE");
    }

    #[test]
    fn discount_range_is_enforced() {
        assert!(ensure_discount_range(dec!(0)).is_ok());
        assert!(ensure_discount_range(dec!(100)).is_ok());
        assert!(ensure_discount_range(dec!(-1)).is_err());
        assert!(ensure_discount_range(dec!(101)).is_err());
    }
}
