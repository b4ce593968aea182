//! Checkout: tax and totals, the session state machine, and the reconciler
//! that drives a cart through an external payment gateway.
//!
//! ```text
//! idle ──start──▶ awaiting_order ──order created──▶ awaiting_gateway ──verified──▶ succeeded
//!  ▲                    │                               │    │
//!  │                    └──order failed──▶ failed ◀─────┘    │ (verification failed)
//!  └───────────────────────widget dismissed──────────────────┘
//! ```
//!
//! The gateway is reached only through [`OrderService`], [`PaymentWidget`]
//! and [`PaymentVerifier`], so the whole flow runs against in-memory fakes in
//! tests and against the storefront API from the CLI.

mod gateway;
mod reconciler;
mod session;

pub use gateway::{
    GatewayOrder, OrderRequest, OrderService, PaymentCompletion, PaymentDetails, PaymentVerifier,
    PaymentWidget, Prefill, Verification, WidgetOptions, WidgetOutcome,
};
pub use reconciler::{CheckoutDetails, CheckoutReconciler};
pub use session::{CheckoutEvent, CheckoutSession, TransitionError};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::price::round_currency;
use crate::types::{CurrencyCode, Price};

/// GST applied to every order unless configured otherwise.
pub const DEFAULT_TAX_RATE: Decimal = Decimal::from_parts(18, 0, 0, false, 2);

/// Failures a checkout can end in. The `Display` text becomes the session's
/// `failure_reason`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// Gateway credentials or settings are missing.
    #[error("payment gateway is not configured: {0}")]
    Configuration(String),

    /// The order request was rejected before reaching the gateway.
    #[error("invalid order: {0}")]
    Validation(String),

    /// The payment signature did not verify.
    #[error("payment could not be verified: {0}")]
    Integrity(String),

    /// A call to an external service failed or returned garbage.
    #[error("payment service error: {0}")]
    Transport(String),
}

/// Branding passed to the hosted payment widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantProfile {
    pub name: String,
    pub description: String,
    pub image: String,
    /// Widget accent colour as a CSS hex string.
    pub theme_color: String,
    /// Address attached to every order's notes.
    pub address: String,
}

impl Default for MerchantProfile {
    fn default() -> Self {
        Self {
            name: "Sakria Farm and HomeStay".to_string(),
            description: "Farm Products & Accommodation".to_string(),
            image: "/images/garden.jpg".to_string(),
            theme_color: "#16a34a".to_string(),
            address: "Sakria Farm and HomeStay, Sustainable Agriculture".to_string(),
        }
    }
}

/// Explicit configuration for a [`CheckoutReconciler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutConfig {
    /// Public gateway key id handed to the payment widget.
    pub gateway_key: String,
    /// Base currency for every order.
    pub currency: CurrencyCode,
    /// Tax rate as a fraction (0.18 = 18%).
    pub tax_rate: Decimal,
    pub merchant: MerchantProfile,
}

impl CheckoutConfig {
    /// Configuration with INR, the default tax rate and default branding.
    #[must_use]
    pub fn new(gateway_key: impl Into<String>) -> Self {
        Self {
            gateway_key: gateway_key.into(),
            currency: CurrencyCode::default(),
            tax_rate: DEFAULT_TAX_RATE,
            merchant: MerchantProfile::default(),
        }
    }

    /// Check that the configuration can be used to start a checkout.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Configuration` if the gateway key is blank or
    /// the tax rate is outside `0..=1`.
    pub fn validate(&self) -> Result<(), CheckoutError> {
        if self.gateway_key.trim().is_empty() {
            return Err(CheckoutError::Configuration(
                "gateway key id is not set".to_string(),
            ));
        }
        if self.tax_rate.is_sign_negative() || self.tax_rate > Decimal::ONE {
            return Err(CheckoutError::Configuration(format!(
                "tax rate must be between 0 and 1 (got {})",
                self.tax_rate
            )));
        }
        Ok(())
    }
}

/// Subtotal, tax and grand total for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl CheckoutTotals {
    /// `tax = subtotal × rate` rounded to 2 decimal places; `total = subtotal + tax`.
    #[must_use]
    pub fn compute(subtotal: Decimal, tax_rate: Decimal) -> Self {
        let tax = round_currency(subtotal * tax_rate);
        Self {
            subtotal,
            tax,
            total: subtotal + tax,
        }
    }

    #[must_use]
    pub const fn total_price(&self, currency: CurrencyCode) -> Price {
        Price::new(self.total, currency)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tax_rate_is_eighteen_percent() {
        assert_eq!(DEFAULT_TAX_RATE, "0.18".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_totals_scenario() {
        let totals = CheckoutTotals::compute(Decimal::from(500), DEFAULT_TAX_RATE);
        assert_eq!(totals.tax, Decimal::from(90));
        assert_eq!(totals.total, Decimal::from(590));
        assert_eq!(
            totals.total_price(CurrencyCode::INR).minor_units().unwrap(),
            59_000
        );
    }

    #[test]
    fn test_totals_round_tax() {
        let totals = CheckoutTotals::compute("99.99".parse().unwrap(), DEFAULT_TAX_RATE);
        assert_eq!(totals.tax, "18.00".parse::<Decimal>().unwrap());
        assert_eq!(totals.total, "117.99".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_config_validate() {
        assert!(CheckoutConfig::new("rzp_test_abc").validate().is_ok());
        assert!(matches!(
            CheckoutConfig::new("  ").validate(),
            Err(CheckoutError::Configuration(_))
        ));

        let mut config = CheckoutConfig::new("rzp_test_abc");
        config.tax_rate = Decimal::from(2);
        assert!(config.validate().is_err());
    }
}
