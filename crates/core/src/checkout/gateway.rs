//! Collaborators the reconciler talks to, and the values exchanged with them.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::CheckoutError;
use crate::types::CurrencyCode;

/// Customer details pre-filled in the payment widget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefill {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub contact: String,
}

/// Request to the order-creation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Amount in minor currency units (paise for INR).
    pub amount: u64,
    pub currency: CurrencyCode,
    pub receipt: String,
    #[serde(default)]
    pub notes: BTreeMap<String, String>,
    #[serde(default)]
    pub prefill: Prefill,
}

impl OrderRequest {
    /// Build an order request, rejecting it before any external call if the
    /// amount or receipt is unusable.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation` for a zero amount or blank receipt.
    pub fn new(
        amount: u64,
        currency: CurrencyCode,
        receipt: impl Into<String>,
    ) -> Result<Self, CheckoutError> {
        if amount == 0 {
            return Err(CheckoutError::Validation("amount is required".to_string()));
        }
        let receipt = receipt.into();
        if receipt.trim().is_empty() {
            return Err(CheckoutError::Validation(
                "receipt reference is required".to_string(),
            ));
        }
        Ok(Self {
            amount,
            currency,
            receipt,
            notes: BTreeMap::new(),
            prefill: Prefill::default(),
        })
    }

    #[must_use]
    pub fn with_notes(mut self, notes: BTreeMap<String, String>) -> Self {
        self.notes = notes;
        self
    }

    #[must_use]
    pub fn with_prefill(mut self, prefill: Prefill) -> Self {
        self.prefill = prefill;
        self
    }
}

/// An order created at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in minor currency units.
    pub amount: u64,
    pub currency: CurrencyCode,
}

/// Everything the hosted payment widget needs to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetOptions {
    pub key: String,
    pub order_id: String,
    /// Amount in minor currency units.
    pub amount: u64,
    pub currency: CurrencyCode,
    pub name: String,
    pub description: String,
    pub image: String,
    pub prefill: Prefill,
    pub notes: BTreeMap<String, String>,
    pub theme_color: String,
}

/// Values the widget hands back when the customer completes payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCompletion {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

/// How a widget interaction ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetOutcome {
    Completed(PaymentCompletion),
    /// Closed by the customer without paying.
    Dismissed,
}

/// Payment details returned once a payment verifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub id: String,
    /// Amount in minor currency units.
    pub amount: u64,
    pub method: String,
}

/// Result of checking a payment signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid(PaymentDetails),
    Invalid(String),
}

/// Creates orders at the payment gateway.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// # Errors
    ///
    /// Returns `CheckoutError` if the order could not be created.
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, CheckoutError>;
}

/// The hosted checkout widget.
#[async_trait]
pub trait PaymentWidget: Send + Sync {
    /// Open the widget and wait until the customer completes or dismisses it.
    async fn open(&self, options: &WidgetOptions) -> WidgetOutcome;
}

/// Checks a completed payment's signature.
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    /// # Errors
    ///
    /// Returns `CheckoutError` if the verification service could not be
    /// reached. A signature that does not match is `Ok(Verification::Invalid)`.
    async fn verify(&self, completion: &PaymentCompletion) -> Result<Verification, CheckoutError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_request_rejects_zero_amount() {
        let err = OrderRequest::new(0, CurrencyCode::INR, "order_1").unwrap_err();
        assert_eq!(err, CheckoutError::Validation("amount is required".to_string()));
    }

    #[test]
    fn test_order_request_rejects_blank_receipt() {
        assert!(matches!(
            OrderRequest::new(100, CurrencyCode::INR, " "),
            Err(CheckoutError::Validation(_))
        ));
    }

    #[test]
    fn test_order_request_builder() {
        let mut notes = BTreeMap::new();
        notes.insert("payment_method".to_string(), "upi".to_string());
        let request = OrderRequest::new(59_000, CurrencyCode::INR, "order_1")
            .unwrap()
            .with_notes(notes.clone())
            .with_prefill(Prefill {
                name: "Asha".to_string(),
                ..Prefill::default()
            });
        assert_eq!(request.amount, 59_000);
        assert_eq!(request.notes, notes);
        assert_eq!(request.prefill.name, "Asha");
    }
}
