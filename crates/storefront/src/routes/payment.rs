//! Payment route handlers (Razorpay).
//!
//! `create-order` and `verify` back the hosted checkout widget; `webhook`
//! receives Razorpay's asynchronous notifications. All three feed the order
//! ledger.

use std::collections::BTreeMap;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State, rejection::JsonRejection},
    http::HeaderMap,
};
use sakria_core::CurrencyCode;
use sakria_core::checkout::Prefill;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::error::{AppError, Result};
use crate::orders::{OrderRecord, Reconciliation};
use crate::razorpay::{
    CreateOrderRequest, WebhookEvent, verify_payment_signature, verify_webhook_signature,
};
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";
pub const EVENT_ID_HEADER: &str = "x-razorpay-event-id";

/// Body of `POST /api/payment/create-order`.
#[derive(Debug, Deserialize)]
pub struct CreateOrderBody {
    /// Amount in minor units (paise).
    pub amount: Option<u64>,
    pub currency: Option<String>,
    pub receipt: Option<String>,
    #[serde(default)]
    pub notes: BTreeMap<String, String>,
    #[serde(default)]
    pub partial_payment: bool,
    /// Customer details shown in the widget; kept on the order as notes.
    #[serde(default)]
    pub prefill: Prefill,
}

/// Body of `POST /api/payment/verify`, as handed back by the checkout widget.
#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Copy prefilled customer details into `notes` without overwriting notes
/// the client set itself.
fn merge_prefill(notes: &mut BTreeMap<String, String>, prefill: Prefill) {
    for (key, value) in [
        ("customer_name", prefill.name),
        ("customer_email", prefill.email),
        ("customer_contact", prefill.contact),
    ] {
        if !value.trim().is_empty() {
            notes.entry(key.to_string()).or_insert(value);
        }
    }
}

/// Create a Razorpay order.
#[instrument(skip(state, payload))]
pub async fn create_order(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateOrderBody>, JsonRejection>,
) -> Result<Json<Value>> {
    let client = state.razorpay()?;
    let Json(body) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let amount = body
        .amount
        .filter(|a| *a > 0)
        .ok_or_else(|| AppError::BadRequest("Amount is required".to_string()))?;

    let currency = match non_blank(body.currency) {
        Some(code) => code
            .parse::<CurrencyCode>()
            .map_err(AppError::BadRequest)?,
        None => state.config().checkout.currency,
    };

    let receipt = non_blank(body.receipt)
        .unwrap_or_else(|| format!("order_{}", chrono::Utc::now().timestamp_millis()));

    let mut notes = body.notes;
    merge_prefill(&mut notes, body.prefill);

    let request = CreateOrderRequest {
        amount,
        currency: currency.code().to_string(),
        receipt,
        notes,
        partial_payment: body.partial_payment,
    };

    let order = client.create_order(&request).await?;
    state.orders().record_created(&order).await;

    Ok(Json(json!({ "success": true, "order": order })))
}

/// Verify the signature returned by the checkout widget.
#[instrument(skip(state, payload))]
pub async fn verify(
    State(state): State<AppState>,
    payload: std::result::Result<Json<VerifyBody>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(body) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let (Some(order_id), Some(payment_id), Some(signature)) = (
        non_blank(body.razorpay_order_id),
        non_blank(body.razorpay_payment_id),
        non_blank(body.razorpay_signature),
    ) else {
        return Err(AppError::BadRequest(
            "Missing required payment parameters".to_string(),
        ));
    };

    let client = state.razorpay()?;

    if verify_payment_signature(
        &order_id,
        &payment_id,
        &signature,
        client.key_secret().expose_secret(),
    )
    .is_err()
    {
        state
            .orders()
            .record_rejected(&order_id, &payment_id, "Invalid payment signature")
            .await;
        return Err(AppError::InvalidSignature(
            "Invalid payment signature".to_string(),
        ));
    }

    let payment = client.fetch_payment(&payment_id).await?;
    state.orders().record_verified(&order_id, &payment).await;

    Ok(Json(json!({
        "success": true,
        "payment": payment,
        "message": "Payment verified successfully",
    })))
}

/// Receive a Razorpay webhook.
///
/// The signature covers the raw body, so the body is taken as bytes and only
/// parsed once it verifies.
#[instrument(skip(state, headers, body), fields(event_id = tracing::field::Empty))]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing signature".to_string()))?;

    let secret = state
        .config()
        .razorpay
        .webhook_secret
        .as_ref()
        .ok_or_else(|| {
            AppError::NotConfigured(
                "Razorpay webhook secret not configured. Set RAZORPAY_WEBHOOK_SECRET in the environment."
                    .to_string(),
            )
        })?;

    if verify_webhook_signature(&body, signature, secret.expose_secret()).is_err() {
        warn!("Webhook signature mismatch");
        return Err(AppError::InvalidSignature(
            "Invalid webhook signature".to_string(),
        ));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {e}")))?;

    if let Some(event_id) = headers.get(EVENT_ID_HEADER).and_then(|h| h.to_str().ok()) {
        tracing::Span::current().record("event_id", event_id);
        if !state.mark_webhook_event(event_id).await {
            info!(event = %event.event, "Duplicate webhook delivery acknowledged");
            return Ok(Json(json!({ "success": true, "duplicate": true })));
        }
    }

    let outcome = state.orders().apply_webhook(&event).await;

    Ok(Json(json!({
        "success": true,
        "reconciled": matches!(outcome, Reconciliation::Applied { .. }),
    })))
}

/// Report whether the payment API is reachable and which credentials are set.
pub async fn test(State(state): State<AppState>) -> Json<Value> {
    let razorpay = &state.config().razorpay;
    Json(json!({
        "success": true,
        "message": "Payment API is working",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": {
            "has_key_id": razorpay.key_id.is_some(),
            "has_key_secret": razorpay.key_secret.is_some(),
            "has_webhook_secret": razorpay.webhook_secret.is_some(),
        },
    }))
}

/// Ledger record for one order.
#[instrument(skip(state))]
pub async fn order_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrderRecord>> {
    state
        .orders()
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefill_keeps_client_notes() {
        let mut notes = BTreeMap::from([("customer_name".to_string(), "Front desk".to_string())]);
        merge_prefill(
            &mut notes,
            Prefill {
                name: "Asha Rao".to_string(),
                email: "asha@example.in".to_string(),
                contact: " ".to_string(),
            },
        );

        assert_eq!(notes["customer_name"], "Front desk");
        assert_eq!(notes["customer_email"], "asha@example.in");
        assert!(!notes.contains_key("customer_contact"));
    }

    #[test]
    fn test_create_order_body_defaults() {
        let body: CreateOrderBody = serde_json::from_str(r#"{"amount": 59000}"#).unwrap();
        assert_eq!(body.amount, Some(59_000));
        assert!(body.notes.is_empty());
        assert!(!body.partial_payment);
        assert_eq!(body.prefill, Prefill::default());
    }
}
