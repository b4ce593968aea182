//! The checkout session and its transition table.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use super::{CheckoutTotals, PaymentDetails};
use crate::cart::Cart;
use crate::types::CheckoutStatus;

/// Something that happened during checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutEvent {
    /// The customer asked to pay.
    Start,
    /// The gateway returned an order id.
    OrderCreated(String),
    /// Order creation failed, with the reason.
    OrderFailed(String),
    /// The customer closed the widget without paying.
    WidgetDismissed,
    /// The payment signature verified.
    PaymentVerified(PaymentDetails),
    /// The payment signature did not verify or could not be checked.
    VerificationFailed(String),
}

impl CheckoutEvent {
    const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::OrderCreated(_) => "order_created",
            Self::OrderFailed(_) => "order_failed",
            Self::WidgetDismissed => "widget_dismissed",
            Self::PaymentVerified(_) => "payment_verified",
            Self::VerificationFailed(_) => "verification_failed",
        }
    }
}

/// An event that is not valid in the session's current status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot apply {event} to a checkout in status {from}")]
pub struct TransitionError {
    pub from: CheckoutStatus,
    pub event: &'static str,
}

/// One checkout attempt. Never persisted.
///
/// Totals are fixed when the session is created from the cart snapshot and
/// are not re-derived later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    cart_snapshot: Cart,
    totals: CheckoutTotals,
    status: CheckoutStatus,
    external_order_id: Option<String>,
    failure_reason: Option<String>,
    payment: Option<PaymentDetails>,
}

impl CheckoutSession {
    /// Start a session in `Idle` for a snapshot of the cart.
    #[must_use]
    pub fn new(cart_snapshot: Cart, tax_rate: Decimal) -> Self {
        let totals = CheckoutTotals::compute(cart_snapshot.subtotal(), tax_rate);
        Self {
            cart_snapshot,
            totals,
            status: CheckoutStatus::Idle,
            external_order_id: None,
            failure_reason: None,
            payment: None,
        }
    }

    #[must_use]
    pub const fn cart_snapshot(&self) -> &Cart {
        &self.cart_snapshot
    }

    #[must_use]
    pub const fn totals(&self) -> &CheckoutTotals {
        &self.totals
    }

    #[must_use]
    pub const fn tax(&self) -> Decimal {
        self.totals.tax
    }

    #[must_use]
    pub const fn total(&self) -> Decimal {
        self.totals.total
    }

    #[must_use]
    pub const fn status(&self) -> CheckoutStatus {
        self.status
    }

    #[must_use]
    pub fn external_order_id(&self) -> Option<&str> {
        self.external_order_id.as_deref()
    }

    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Verified payment, once the session has succeeded.
    #[must_use]
    pub const fn payment(&self) -> Option<&PaymentDetails> {
        self.payment.as_ref()
    }

    /// Apply `event`, returning the new status.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` and leaves the session untouched if `event`
    /// is not allowed in the current status.
    pub fn apply(&mut self, event: CheckoutEvent) -> Result<CheckoutStatus, TransitionError> {
        use CheckoutEvent as E;
        use CheckoutStatus as S;

        match (self.status, event) {
            (S::Idle, E::Start) => {
                self.status = S::AwaitingOrder;
            }
            (S::AwaitingOrder, E::OrderCreated(order_id)) => {
                self.external_order_id = Some(order_id);
                self.status = S::AwaitingGateway;
            }
            (S::AwaitingOrder, E::OrderFailed(reason))
            | (S::AwaitingGateway, E::VerificationFailed(reason)) => {
                self.failure_reason = Some(reason);
                self.status = S::Failed;
            }
            (S::AwaitingGateway, E::WidgetDismissed) => {
                // Cancellation is not a failure: back to idle, ready to retry.
                self.external_order_id = None;
                self.status = S::Idle;
            }
            (S::AwaitingGateway, E::PaymentVerified(payment)) => {
                self.payment = Some(payment);
                self.status = S::Succeeded;
            }
            (from, event) => {
                return Err(TransitionError {
                    from,
                    event: event.name(),
                });
            }
        }

        Ok(self.status)
    }
}
