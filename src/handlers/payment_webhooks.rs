//! Payment gateway webhook endpoint.
//!
//! The gateway signs deliveries with an HMAC over `{timestamp}.{body}` and
//! sends it in the `Stripe-Signature` header as `t=<ts>,v1=<hex>`. A
//! delivery that fails verification is treated as an unauthenticated
//! caller and rejected with 401, and so is every delivery when no signing
//! secret is configured. Events other than a completed checkout are
//! acknowledged and ignored so the gateway stops redelivering them.

use crate::errors::ServiceError;
use crate::services::payments::{PaymentEvent, EVENT_CHECKOUT_COMPLETED};
use crate::AppState;
use axum::{extract::State, http::HeaderMap, response::IntoResponse};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

#[utoipa::path(
    post,
    path = "/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted"),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let secret = state
        .config
        .payment_webhook_secret
        .as_deref()
        .ok_or_else(|| {
            warn!("Payment webhook received but no signing secret is configured; rejecting");
            ServiceError::Unauthorized("webhook signing is not configured".to_string())
        })?;

    let tolerance = state.config.payment_webhook_tolerance_secs;
    if !verify_signature(&headers, &body, secret, tolerance) {
        warn!("Payment webhook signature verification failed");
        return Err(ServiceError::Unauthorized(
            "invalid webhook signature".to_string(),
        ));
    }

    let event: PaymentEvent = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::ValidationError(format!("invalid webhook payload: {e}")))?;

    match event.event_type.as_str() {
        EVENT_CHECKOUT_COMPLETED => {
            state
                .services
                .orders
                .record_payment(&event.data.object)
                .await?;
        }
        other => {
            info!("Ignoring payment webhook event type {}", other);
        }
    }

    Ok((axum::http::StatusCode::OK, "ok"))
}

fn verify_signature(headers: &HeaderMap, payload: &Bytes, secret: &str, tolerance_secs: u64) -> bool {
    let header = match headers
        .get("Stripe-Signature")
        .and_then(|h| h.to_str().ok())
    {
        Some(header) => header,
        None => return false,
    };

    let mut ts = "";
    let mut v1 = "";
    for part in header.split(',') {
        let mut it = part.trim().split('=');
        match (it.next(), it.next()) {
            (Some("t"), Some(val)) => ts = val,
            (Some("v1"), Some(val)) => v1 = val,
            _ => {}
        }
    }
    if ts.is_empty() || v1.is_empty() {
        return false;
    }

    if let Ok(ts_i) = ts.parse::<i64>() {
        let now = chrono::Utc::now().timestamp();
        if (now - ts_i).unsigned_abs() > tolerance_secs {
            return false;
        }
    } else {
        return false;
    }

    let signed = format!("{}.{}", ts, std::str::from_utf8(payload).unwrap_or(""));
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(signed.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, v1)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

/// Sign a webhook body the way the gateway does. Test helper.
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let signed = format!("{}.{}", timestamp, std::str::from_utf8(body).unwrap_or(""));
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(signed.as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "whsec_test";

    fn signed_headers(body: &Bytes, timestamp: i64) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let value = sign_payload(SECRET, timestamp, body);
        headers.insert("Stripe-Signature", HeaderValue::from_str(&value).unwrap());
        headers
    }

    #[test]
    fn valid_signature_passes() {
        let body = Bytes::from_static(b"{\"id\":\"evt_1\"}");
        let headers = signed_headers(&body, chrono::Utc::now().timestamp());
        assert!(verify_signature(&headers, &body, SECRET, 300));
    }

    #[test]
    fn tampered_body_fails() {
        let body = Bytes::from_static(b"{\"id\":\"evt_1\"}");
        let headers = signed_headers(&body, chrono::Utc::now().timestamp());
        let other = Bytes::from_static(b"{\"id\":\"evt_2\"}");
        assert!(!verify_signature(&headers, &other, SECRET, 300));
    }

    #[test]
    fn wrong_secret_fails() {
        let body = Bytes::from_static(b"{}");
        let headers = signed_headers(&body, chrono::Utc::now().timestamp());
        assert!(!verify_signature(&headers, &body, "whsec_other", 300));
    }

    #[test]
    fn stale_timestamp_fails() {
        let body = Bytes::from_static(b"{}");
        let headers = signed_headers(&body, chrono::Utc::now().timestamp() - 3600);
        assert!(!verify_signature(&headers, &body, SECRET, 300));
    }

    #[test]
    fn missing_header_fails() {
        let body = Bytes::from_static(b"{}");
        assert!(!verify_signature(&HeaderMap::new(), &body, SECRET, 300));
    }

    #[test]
    fn malformed_header_fails() {
        let body = Bytes::from_static(b"{}");
        let mut headers = HeaderMap::new();
        headers.insert(
            "Stripe-Signature",
            HeaderValue::from_static("v1=deadbeef"),
        );
        assert!(!verify_signature(&headers, &body, SECRET, 300));
    }
}
