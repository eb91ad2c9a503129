use crate::entities::{order, user, Order, User};
use crate::errors::ServiceError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Accounts and credentials.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ShippingAddressInput {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub province: String,
    pub phone: String,
}

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| ServiceError::HashError(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Register a new account. Emails are unique, compared lowercase.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> Result<user::Model, ServiceError> {
        let email = input.email.trim().to_lowercase();

        let existing = User::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::AlreadyExists(format!(
                "User with email {email} already exists"
            )));
        }

        let password_hash = hash_password(&input.password)?;
        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            full_name: Set(input.full_name),
            email: Set(email),
            password_hash: Set(password_hash),
            is_admin: Set(false),
            has_shipping_address: Set(false),
            shipping_first_name: Set(None),
            shipping_last_name: Set(None),
            shipping_address: Set(None),
            shipping_city: Set(None),
            shipping_postal_code: Set(None),
            shipping_province: Set(None),
            shipping_phone: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        let user = user.insert(&*self.db).await?;
        info!("Registered user {}", user.id);
        Ok(user)
    }

    /// Verify credentials and return the account.
    ///
    /// An unknown email and a wrong password produce the same error so the
    /// endpoint cannot be used to enumerate accounts.
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<user::Model, ServiceError> {
        let email = email.trim().to_lowercase();

        let user = User::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(ServiceError::InvalidCredentials);
        }

        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {user_id} not found")))
    }

    /// Account profile: the user plus their orders, newest first.
    #[instrument(skip(self))]
    pub async fn get_profile(
        &self,
        user_id: Uuid,
    ) -> Result<(user::Model, Vec<order::Model>), ServiceError> {
        let user = self.get_user(user_id).await?;

        let orders = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok((user, orders))
    }

    /// Record the account's shipping address for future orders.
    #[instrument(skip(self, input))]
    pub async fn update_shipping_address(
        &self,
        user_id: Uuid,
        input: ShippingAddressInput,
    ) -> Result<user::Model, ServiceError> {
        let user = self.get_user(user_id).await?;
        let mut active: user::ActiveModel = user.into();

        active.shipping_first_name = Set(Some(input.first_name));
        active.shipping_last_name = Set(Some(input.last_name));
        active.shipping_address = Set(Some(input.address));
        active.shipping_city = Set(Some(input.city));
        active.shipping_postal_code = Set(Some(input.postal_code));
        active.shipping_province = Set(Some(input.province));
        active.shipping_phone = Set(Some(input.phone));
        active.has_shipping_address = Set(true);
        active.updated_at = Set(Some(Utc::now()));

        let user = active.update(&*self.db).await?;
        info!("Updated shipping address for user {}", user_id);
        Ok(user)
    }
}
