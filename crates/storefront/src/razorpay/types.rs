//! Razorpay REST and webhook payloads.
//!
//! Only the fields the storefront reads are typed; everything is lenient
//! about extra fields and missing optional ones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Body of `POST /v1/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOrderRequest {
    /// Amount in minor units (paise).
    pub amount: u64,
    pub currency: String,
    pub receipt: String,
    pub notes: BTreeMap<String, String>,
    pub partial_payment: bool,
}

/// A Razorpay order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    #[serde(default)]
    pub entity: String,
    pub amount: u64,
    #[serde(default)]
    pub amount_paid: u64,
    #[serde(default)]
    pub amount_due: u64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub attempts: u32,
    /// Razorpay sends `[]` for empty notes, so this stays untyped.
    #[serde(default)]
    pub notes: serde_json::Value,
    #[serde(default)]
    pub created_at: i64,
}

/// A Razorpay payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    #[serde(default)]
    pub entity: String,
    pub amount: u64,
    pub currency: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub captured: bool,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

/// A Razorpay refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub payment_id: String,
    pub amount: u64,
    #[serde(default)]
    pub status: String,
}

/// Error body returned by the REST API.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
}

/// A webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<Wrapped<Payment>>,
    #[serde(default)]
    pub order: Option<Wrapped<Order>>,
    #[serde(default)]
    pub refund: Option<Wrapped<Refund>>,
}

/// Webhook payload members are wrapped as `{"entity": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Wrapped<T> {
    pub entity: T,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_accepts_empty_notes_array() {
        let order: Order = serde_json::from_str(
            r#"{"id":"order_1","entity":"order","amount":59000,"amount_paid":0,
                "amount_due":59000,"currency":"INR","receipt":"order_1700",
                "status":"created","attempts":0,"notes":[],"created_at":1700000000}"#,
        )
        .unwrap();
        assert_eq!(order.amount, 59_000);
        assert_eq!(order.notes, serde_json::json!([]));
    }

    #[test]
    fn test_webhook_event_payment_captured() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"entity":"event","event":"payment.captured","payload":{"payment":{"entity":
                {"id":"pay_1","amount":59000,"currency":"INR","status":"captured",
                 "order_id":"order_1","method":"upi","captured":true}}},"created_at":1}"#,
        )
        .unwrap();
        let payment = event.payload.payment.unwrap().entity;
        assert_eq!(payment.order_id.as_deref(), Some("order_1"));
        assert!(event.payload.order.is_none());
    }

    #[test]
    fn test_webhook_event_without_payload() {
        let event: WebhookEvent = serde_json::from_str(r#"{"event":"account.updated"}"#).unwrap();
        assert_eq!(event.event, "account.updated");
        assert!(event.payload.refund.is_none());
    }
}
