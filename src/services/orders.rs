//! Order workflow: placement, payment reconciliation, and admin updates.
//!
//! Placing an order validates the coupon and shipping address, snapshots
//! product prices, writes the order and its items and the sold counters in
//! one transaction, then asks the payment gateway for a hosted checkout
//! session. A gateway failure after commit leaves the order pending and is
//! surfaced to the caller; the sold counter update is a read-modify-write
//! and concurrent orders for one product can race.

use crate::entities::{
    coupon, order, order_item, product, user, Coupon, Order, OrderItem, Product, User,
};
use crate::errors::ServiceError;
use crate::services::coupons::normalize_code;
use crate::services::payments::{
    minor_units, CheckoutLineItem, CheckoutSessionObject, PaymentGateway,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const INITIAL_PAYMENT_STATUS: &str = "pending";
const INITIAL_PAYMENT_METHOD: &str = "none";

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<PaymentGateway>,
    currency: String,
}

#[derive(Debug, Clone)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct PlaceOrderInput {
    pub coupon_code: Option<String>,
    pub items: Vec<OrderItemInput>,
    /// Overrides the stored address for this order. The account must still
    /// have a shipping address on file.
    pub shipping: Option<ShippingSnapshot>,
}

#[derive(Debug, Clone)]
pub struct ShippingSnapshot {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub province: String,
    pub phone: String,
}

#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub checkout_url: String,
}

/// Aggregates over all orders, used by the sales dashboard.
#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct SalesStats {
    pub total_orders: u64,
    pub min_order: Option<Decimal>,
    pub max_order: Option<Decimal>,
    pub total_sales: Decimal,
    pub average_order: Option<Decimal>,
    pub today_sales: Decimal,
}

/// Apply a percentage discount to an order total.
pub fn apply_discount(total: Decimal, discount_percent: Option<Decimal>) -> Decimal {
    match discount_percent {
        Some(d) => total * (Decimal::ONE - d / Decimal::from(100)),
        None => total,
    }
}

fn generate_order_number() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("ORD-{}", raw[..10].to_uppercase())
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, gateway: Arc<PaymentGateway>, currency: String) -> Self {
        Self {
            db,
            gateway,
            currency,
        }
    }

    /// Place an order for a user and open a checkout session for it.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn place_order(
        &self,
        user_id: Uuid,
        input: PlaceOrderInput,
    ) -> Result<PlacedOrder, ServiceError> {
        // Coupon checks come first and are distinct: an unknown code and an
        // expired one are different failures.
        let coupon = match &input.coupon_code {
            Some(code) => {
                let code = normalize_code(code);
                let coupon = Coupon::find()
                    .filter(coupon::Column::Code.eq(code.clone()))
                    .one(&*self.db)
                    .await?
                    .ok_or_else(|| ServiceError::CouponNotFound(code.clone()))?;
                if coupon.is_expired() {
                    return Err(ServiceError::CouponExpired(code));
                }
                Some(coupon)
            }
            None => None,
        };

        let user = User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {user_id} not found")))?;

        let shipping = resolve_shipping(&user, input.shipping)?;

        if input.items.is_empty() {
            return Err(ServiceError::EmptyOrder);
        }
        for item in &input.items {
            if item.quantity <= 0 {
                return Err(ServiceError::ValidationError(
                    "Item quantity must be positive".to_string(),
                ));
            }
        }

        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let txn = self.db.begin().await?;

        let mut total = Decimal::ZERO;
        let mut items = Vec::with_capacity(input.items.len());
        let mut checkout_items = Vec::with_capacity(input.items.len());

        for item in &input.items {
            let product = Product::find_by_id(item.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;

            let quantity = item.quantity;
            total += product.price * Decimal::from(quantity);

            items.push(order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                name: Set(product.name.clone()),
                quantity: Set(quantity),
                unit_price: Set(product.price),
            });

            checkout_items.push(CheckoutLineItem {
                name: product.name.clone(),
                description: product.description.clone(),
                unit_amount: minor_units(product.price)?,
                quantity: quantity as i64,
            });

            let sold = product.total_sold + quantity;
            let mut active: product::ActiveModel = product.into();
            active.total_sold = Set(sold);
            active.updated_at = Set(Some(now));
            active.update(&txn).await?;
        }

        let total_price = apply_discount(total, coupon.as_ref().map(|c| c.discount));

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(generate_order_number()),
            user_id: Set(user_id),
            status: Set(order::OrderStatus::Pending),
            total_price: Set(total_price),
            currency: Set(self.currency.clone()),
            payment_status: Set(INITIAL_PAYMENT_STATUS.to_string()),
            payment_method: Set(INITIAL_PAYMENT_METHOD.to_string()),
            amount_paid: Set(None),
            shipping_first_name: Set(Some(shipping.first_name)),
            shipping_last_name: Set(Some(shipping.last_name)),
            shipping_address: Set(Some(shipping.address)),
            shipping_city: Set(Some(shipping.city)),
            shipping_postal_code: Set(Some(shipping.postal_code)),
            shipping_province: Set(Some(shipping.province)),
            shipping_phone: Set(Some(shipping.phone)),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let order = order.insert(&txn).await?;

        let mut inserted_items = Vec::with_capacity(items.len());
        for item in items {
            inserted_items.push(item.insert(&txn).await?);
        }

        txn.commit().await?;
        info!("Placed order {} for user {}", order.id, user_id);

        // The order is already committed: a gateway failure here leaves it
        // pending and unpaid, and the caller sees the gateway error.
        let session = self
            .gateway
            .create_checkout_session(order.id, &checkout_items)
            .await?;

        Ok(PlacedOrder {
            order,
            items: inserted_items,
            checkout_url: session.url,
        })
    }

    /// Reconcile a completed checkout session against its order.
    ///
    /// Unknown or unparseable order references are logged and ignored so the
    /// gateway does not keep redelivering an event this service can never
    /// apply. Replays of the same event overwrite with identical values.
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub async fn record_payment(
        &self,
        session: &CheckoutSessionObject,
    ) -> Result<(), ServiceError> {
        let order_id = match session.order_id() {
            Some(id) => id,
            None => {
                warn!(
                    "Checkout session {} carries no usable order reference; ignoring",
                    session.id
                );
                return Ok(());
            }
        };

        let order = match Order::find_by_id(order_id).one(&*self.db).await? {
            Some(order) => order,
            None => {
                warn!(
                    "Checkout session {} references unknown order {}; ignoring",
                    session.id, order_id
                );
                return Ok(());
            }
        };

        let mut active: order::ActiveModel = order.into();
        active.payment_status = Set(session
            .payment_status
            .clone()
            .unwrap_or_else(|| "paid".to_string()));
        active.payment_method = Set(session
            .payment_method_types
            .as_ref()
            .and_then(|types| types.first().cloned())
            .unwrap_or_else(|| "card".to_string()));
        if let Some(currency) = &session.currency {
            active.currency = Set(currency.clone());
        }
        if let Some(amount_total) = session.amount_total {
            active.amount_paid = Set(Some(Decimal::from(amount_total) / Decimal::from(100)));
        }
        active.updated_at = Set(Some(Utc::now()));

        active.update(&*self.db).await?;
        info!("Recorded payment for order {}", order_id);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        Ok((order, items))
    }

    /// List orders, newest first. Non-admin callers only see their own.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        user_id: Option<Uuid>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = Order::find().order_by_desc(order::Column::CreatedAt);
        if let Some(user_id) = user_id {
            query = query.filter(order::Column::UserId.eq(user_id));
        }

        let paginator = query.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((orders, total))
    }

    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        status: order::OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let (order, _) = self.get_order(order_id).await?;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(status);
        active.updated_at = Set(Some(Utc::now()));

        let order = active.update(&*self.db).await?;
        info!("Order {} status set to {}", order_id, order.status);
        Ok(order)
    }

    /// Aggregate sales figures across all orders.
    #[instrument(skip(self))]
    pub async fn sales_stats(&self) -> Result<SalesStats, ServiceError> {
        let orders = Order::find().all(&*self.db).await?;
        let today_start = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
            .unwrap_or_else(|| Utc::now() - Duration::days(1));

        let totals: Vec<Decimal> = orders.iter().map(|o| o.total_price).collect();
        let total_sales: Decimal = totals.iter().copied().sum();
        let today_sales: Decimal = orders
            .iter()
            .filter(|o| o.created_at >= today_start)
            .map(|o| o.total_price)
            .sum();

        let average_order = if totals.is_empty() {
            None
        } else {
            Some((total_sales / Decimal::from(totals.len() as i64)).round_dp(2))
        };

        Ok(SalesStats {
            total_orders: totals.len() as u64,
            min_order: totals.iter().copied().min(),
            max_order: totals.iter().copied().max(),
            total_sales,
            average_order,
            today_sales,
        })
    }
}

fn resolve_shipping(
    user: &user::Model,
    provided: Option<ShippingSnapshot>,
) -> Result<ShippingSnapshot, ServiceError> {
    // The account must have an address on file before it can order,
    // whether or not the request carries one.
    if !user.has_shipping_address {
        return Err(ServiceError::ShippingAddressRequired);
    }

    if let Some(shipping) = provided {
        return Ok(shipping);
    }

    // has_shipping_address guarantees the columns are populated
    Ok(ShippingSnapshot {
        first_name: user.shipping_first_name.clone().unwrap_or_default(),
        last_name: user.shipping_last_name.clone().unwrap_or_default(),
        address: user.shipping_address.clone().unwrap_or_default(),
        city: user.shipping_city.clone().unwrap_or_default(),
        postal_code: user.shipping_postal_code.clone().unwrap_or_default(),
        province: user.shipping_province.clone().unwrap_or_default(),
        phone: user.shipping_phone.clone().unwrap_or_default(),
    })
}
