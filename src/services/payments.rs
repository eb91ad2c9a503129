//! Hosted-checkout payment gateway client.
//!
//! Payment capture is delegated to the gateway: placing an order creates a
//! checkout session and hands the buyer its URL. Settlement comes back
//! asynchronously through the signed webhook.

use crate::config::AppConfig;
use crate::errors::ServiceError;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Webhook event kind that settles an order.
pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Clone)]
pub struct PaymentGateway {
    http: Client,
    base_url: String,
    secret_key: String,
    currency: String,
    success_url: String,
    cancel_url: String,
}

/// One checkout line, amounts in minor units (cents).
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutLineItem {
    pub name: String,
    pub description: String,
    pub unit_amount: i64,
    pub quantity: i64,
}

/// Hosted checkout session created by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: PaymentEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEventData {
    pub object: CheckoutSessionObject,
}

/// Checkout session payload carried by a webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub payment_method_types: Option<Vec<String>>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionObject {
    /// Order id carried in the session metadata, if parseable.
    pub fn order_id(&self) -> Option<Uuid> {
        self.metadata
            .get("order_id")
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

/// Convert a major-unit price to gateway minor units (cents).
/// Half a cent rounds up, not to the nearest even cent.
pub fn minor_units(price: Decimal) -> Result<i64, ServiceError> {
    (price * Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| ServiceError::InternalError(format!("price {price} out of range")))
}

impl PaymentGateway {
    pub fn new(
        base_url: String,
        secret_key: String,
        currency: String,
        success_url: String,
        cancel_url: String,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url,
            secret_key,
            currency,
            success_url,
            cancel_url,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.payment_gateway_url.clone(),
            cfg.payment_secret_key.clone(),
            cfg.payment_currency.clone(),
            cfg.payment_success_url.clone(),
            cfg.payment_cancel_url.clone(),
        )
    }

    /// Create a hosted checkout session for an order.
    #[instrument(skip(self, items), fields(order_id = %order_id))]
    pub async fn create_checkout_session(
        &self,
        order_id: Uuid,
        items: &[CheckoutLineItem],
    ) -> Result<CheckoutSession, ServiceError> {
        let line_items: Vec<_> = items
            .iter()
            .map(|item| {
                json!({
                    "quantity": item.quantity,
                    "price_data": {
                        "currency": self.currency,
                        "unit_amount": item.unit_amount,
                        "product_data": {
                            "name": item.name,
                            "description": item.description,
                        }
                    }
                })
            })
            .collect();

        let body = json!({
            "mode": "payment",
            "success_url": self.success_url,
            "cancel_url": self.cancel_url,
            "metadata": { "order_id": order_id.to_string() },
            "line_items": line_items,
        });

        let url = format!(
            "{}/v1/checkout/sessions",
            self.base_url.trim_end_matches('/')
        );

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::PaymentGateway(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::PaymentGateway(format!(
                "checkout session request returned {status}"
            )));
        }

        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| ServiceError::PaymentGateway(format!("invalid session payload: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn minor_units_converts_major_prices() {
        assert_eq!(minor_units(dec!(20.00)).unwrap(), 2000);
        assert_eq!(minor_units(dec!(9.99)).unwrap(), 999);
    }

    #[test]
    fn minor_units_rounds_half_cents_up() {
        // Banker's rounding would send these to the nearest even cent
        assert_eq!(minor_units(dec!(0.005)).unwrap(), 1);
        assert_eq!(minor_units(dec!(0.025)).unwrap(), 3);
    }

    #[test]
    fn order_id_parses_from_metadata() {
        let id = Uuid::new_v4();
        let mut metadata = HashMap::new();
        metadata.insert("order_id".to_string(), id.to_string());

        let object = CheckoutSessionObject {
            id: "cs_test_1".to_string(),
            payment_status: Some("paid".to_string()),
            payment_method_types: None,
            currency: Some("usd".to_string()),
            amount_total: Some(3600),
            metadata,
        };
        assert_eq!(object.order_id(), Some(id));
    }

    #[test]
    fn malformed_order_id_yields_none() {
        let mut metadata = HashMap::new();
        metadata.insert("order_id".to_string(), "not-a-uuid".to_string());

        let object = CheckoutSessionObject {
            id: "cs_test_2".to_string(),
            payment_status: None,
            payment_method_types: None,
            currency: None,
            amount_total: None,
            metadata,
        };
        assert_eq!(object.order_id(), None);
    }

    #[test]
    fn event_envelope_deserializes() {
        let raw = serde_json::json!({
            "id": "evt_1",
            "type": EVENT_CHECKOUT_COMPLETED,
            "data": { "object": {
                "id": "cs_1",
                "payment_status": "paid",
                "payment_method_types": ["card"],
                "currency": "usd",
                "amount_total": 3600,
                "metadata": { "order_id": Uuid::new_v4().to_string() }
            }}
        });

        let event: PaymentEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.event_type, EVENT_CHECKOUT_COMPLETED);
        assert_eq!(event.data.object.amount_total, Some(3600));
    }
}
