//! In-process order ledger keyed by gateway order id.
//!
//! Records what the server has learned about each Razorpay order from
//! order creation, checkout verification and webhooks. State only moves
//! forward (see [`OrderState::rank`]), so a late `payment.failed` never
//! downgrades a paid order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sakria_core::OrderState;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::razorpay::{Order, Payment, WebhookEvent};

/// What the ledger knows about one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRecord {
    pub order_id: String,
    /// Amount in minor units.
    pub amount: u64,
    pub currency: String,
    pub receipt: Option<String>,
    pub state: OrderState,
    pub payment_id: Option<String>,
    pub method: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRecord {
    fn new(order_id: &str, amount: u64, currency: &str) -> Self {
        let now = Utc::now();
        Self {
            order_id: order_id.to_string(),
            amount,
            currency: currency.to_string(),
            receipt: None,
            state: OrderState::Created,
            payment_id: None,
            method: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `target` unless that would go backwards. Returns whether the
    /// state changed.
    fn advance(&mut self, target: OrderState) -> bool {
        if target == self.state || target.rank() < self.state.rank() {
            return false;
        }
        self.state = target;
        self.updated_at = Utc::now();
        true
    }

    fn attach_payment(&mut self, payment: &Payment) {
        self.payment_id = Some(payment.id.clone());
        if payment.method.is_some() {
            self.method.clone_from(&payment.method);
        }
        if self.amount == 0 {
            self.amount = payment.amount;
        } else if payment.amount != self.amount {
            error!(
                order_id = %self.order_id,
                payment_id = %payment.id,
                expected = self.amount,
                actual = payment.amount,
                "Payment amount does not match order amount"
            );
        }
    }
}

/// Outcome of applying a webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The order moved to a new state.
    Applied { order_id: String, state: OrderState },
    /// The order was already at or past the event's state.
    Unchanged { order_id: String, state: OrderState },
    /// The event type is not reconciled, or carried no usable entity.
    Ignored,
}

/// Shared, cloneable order ledger.
#[derive(Debug, Clone, Default)]
pub struct OrderLedger {
    records: Arc<RwLock<HashMap<String, OrderRecord>>>,
}

impl OrderLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly created gateway order.
    pub async fn record_created(&self, order: &Order) {
        let mut records = self.records.write().await;
        let record = records
            .entry(order.id.clone())
            .or_insert_with(|| OrderRecord::new(&order.id, order.amount, &order.currency));
        record.receipt.clone_from(&order.receipt);
        info!(order_id = %order.id, amount = order.amount, "Order recorded");
    }

    /// Record a checkout callback whose signature did not verify.
    pub async fn record_rejected(&self, order_id: &str, payment_id: &str, reason: &str) {
        let mut records = self.records.write().await;
        let record = records
            .entry(order_id.to_string())
            .or_insert_with(|| OrderRecord::new(order_id, 0, ""));
        if record.advance(OrderState::Attempted) {
            record.payment_id = Some(payment_id.to_string());
            record.failure_reason = Some(reason.to_string());
        }
        warn!(order_id, payment_id, reason, "Payment attempt rejected");
    }

    /// Record a payment whose checkout signature verified.
    pub async fn record_verified(&self, order_id: &str, payment: &Payment) {
        let mut records = self.records.write().await;
        let record = records
            .entry(order_id.to_string())
            .or_insert_with(|| OrderRecord::new(order_id, payment.amount, &payment.currency));
        record.attach_payment(payment);
        if record.advance(OrderState::Paid) {
            record.failure_reason = None;
        }
        info!(order_id, payment_id = %payment.id, "Payment verified");
    }

    /// Reconcile a verified webhook event into the ledger.
    pub async fn apply_webhook(&self, event: &WebhookEvent) -> Reconciliation {
        let payment = event.payload.payment.as_ref().map(|p| &p.entity);
        let order = event.payload.order.as_ref().map(|o| &o.entity);

        let (target, order_id) = match event.event.as_str() {
            "payment.captured" => (OrderState::Paid, payment.and_then(|p| p.order_id.clone())),
            "payment.failed" => (OrderState::Failed, payment.and_then(|p| p.order_id.clone())),
            "order.paid" => (
                OrderState::Paid,
                order
                    .map(|o| o.id.clone())
                    .or_else(|| payment.and_then(|p| p.order_id.clone())),
            ),
            "refund.processed" => (OrderState::Refunded, payment.and_then(|p| p.order_id.clone())),
            other => {
                info!(event = other, "Unhandled webhook event");
                return Reconciliation::Ignored;
            }
        };

        let mut records = self.records.write().await;

        // Refund payloads may omit the payment entity; fall back to the
        // payment id recorded at verification.
        let order_id = order_id.or_else(|| {
            let refund = event.payload.refund.as_ref()?;
            records
                .values()
                .find(|r| r.payment_id.as_deref() == Some(refund.entity.payment_id.as_str()))
                .map(|r| r.order_id.clone())
        });

        let Some(order_id) = order_id else {
            warn!(event = %event.event, "Webhook event carries no order id");
            return Reconciliation::Ignored;
        };

        let record = records.entry(order_id.clone()).or_insert_with(|| {
            info!(order_id = %order_id, event = %event.event, "Webhook for unknown order, creating record");
            let (amount, currency) = order
                .map(|o| (o.amount, o.currency.clone()))
                .or_else(|| payment.map(|p| (p.amount, p.currency.clone())))
                .unwrap_or_default();
            OrderRecord::new(&order_id, amount, &currency)
        });

        if let Some(payment) = payment {
            if target == OrderState::Failed {
                record.payment_id.get_or_insert_with(|| payment.id.clone());
            } else if target != OrderState::Refunded {
                record.attach_payment(payment);
            }
        }

        if record.advance(target) {
            if target == OrderState::Failed {
                record.failure_reason = payment
                    .and_then(|p| p.error_description.clone())
                    .or_else(|| Some("payment failed".to_string()));
            }
            info!(order_id = %order_id, state = %target, event = %event.event, "Order reconciled");
            Reconciliation::Applied {
                order_id,
                state: target,
            }
        } else {
            info!(
                order_id = %order_id,
                state = %record.state,
                event = %event.event,
                "Webhook did not change order state"
            );
            Reconciliation::Unchanged {
                order_id,
                state: record.state,
            }
        }
    }

    pub async fn get(&self, order_id: &str) -> Option<OrderRecord> {
        self.records.read().await.get(order_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order(id: &str, amount: u64) -> Order {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "amount": amount,
            "currency": "INR",
            "receipt": "order_1700",
            "status": "created",
        }))
        .unwrap()
    }

    fn payment(id: &str, order_id: &str, amount: u64) -> Payment {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "amount": amount,
            "currency": "INR",
            "status": "captured",
            "order_id": order_id,
            "method": "upi",
        }))
        .unwrap()
    }

    fn event(name: &str, payload: serde_json::Value) -> WebhookEvent {
        serde_json::from_value(serde_json::json!({ "event": name, "payload": payload })).unwrap()
    }

    fn payment_event(name: &str, order_id: &str) -> WebhookEvent {
        event(
            name,
            serde_json::json!({
                "payment": { "entity": {
                    "id": "pay_1", "amount": 59000, "currency": "INR",
                    "order_id": order_id, "error_description": "Card declined"
                }}
            }),
        )
    }

    #[tokio::test]
    async fn test_created_then_verified() {
        let ledger = OrderLedger::new();
        ledger.record_created(&order("order_1", 59_000)).await;

        let record = ledger.get("order_1").await.unwrap();
        assert_eq!(record.state, OrderState::Created);
        assert_eq!(record.receipt.as_deref(), Some("order_1700"));

        ledger
            .record_verified("order_1", &payment("pay_1", "order_1", 59_000))
            .await;
        let record = ledger.get("order_1").await.unwrap();
        assert_eq!(record.state, OrderState::Paid);
        assert_eq!(record.payment_id.as_deref(), Some("pay_1"));
        assert_eq!(record.method.as_deref(), Some("upi"));
    }

    #[tokio::test]
    async fn test_rejected_attempt() {
        let ledger = OrderLedger::new();
        ledger.record_created(&order("order_1", 59_000)).await;
        ledger
            .record_rejected("order_1", "pay_1", "Invalid payment signature")
            .await;

        let record = ledger.get("order_1").await.unwrap();
        assert_eq!(record.state, OrderState::Attempted);
        assert_eq!(
            record.failure_reason.as_deref(),
            Some("Invalid payment signature")
        );
    }

    #[tokio::test]
    async fn test_late_failure_never_downgrades_paid() {
        let ledger = OrderLedger::new();
        ledger.record_created(&order("order_1", 59_000)).await;
        ledger
            .record_verified("order_1", &payment("pay_1", "order_1", 59_000))
            .await;

        let outcome = ledger
            .apply_webhook(&payment_event("payment.failed", "order_1"))
            .await;
        assert_eq!(
            outcome,
            Reconciliation::Unchanged {
                order_id: "order_1".to_string(),
                state: OrderState::Paid
            }
        );
        assert_eq!(ledger.get("order_1").await.unwrap().state, OrderState::Paid);
    }

    #[tokio::test]
    async fn test_payment_failed_records_reason() {
        let ledger = OrderLedger::new();
        ledger.record_created(&order("order_1", 59_000)).await;
        ledger
            .apply_webhook(&payment_event("payment.failed", "order_1"))
            .await;

        let record = ledger.get("order_1").await.unwrap();
        assert_eq!(record.state, OrderState::Failed);
        assert_eq!(record.failure_reason.as_deref(), Some("Card declined"));
    }

    #[tokio::test]
    async fn test_captured_webhook_for_unknown_order_creates_record() {
        let ledger = OrderLedger::new();
        let outcome = ledger
            .apply_webhook(&payment_event("payment.captured", "order_9"))
            .await;
        assert_eq!(
            outcome,
            Reconciliation::Applied {
                order_id: "order_9".to_string(),
                state: OrderState::Paid
            }
        );
        let record = ledger.get("order_9").await.unwrap();
        assert_eq!(record.amount, 59_000);
        assert_eq!(record.currency, "INR");
    }

    #[tokio::test]
    async fn test_order_paid_uses_order_entity() {
        let ledger = OrderLedger::new();
        let outcome = ledger
            .apply_webhook(&event(
                "order.paid",
                serde_json::json!({
                    "order": { "entity": { "id": "order_5", "amount": 1000, "currency": "INR" }}
                }),
            ))
            .await;
        assert!(matches!(outcome, Reconciliation::Applied { state: OrderState::Paid, .. }));
        assert_eq!(ledger.get("order_5").await.unwrap().amount, 1000);
    }

    #[tokio::test]
    async fn test_refund_found_by_payment_id() {
        let ledger = OrderLedger::new();
        ledger.record_created(&order("order_1", 59_000)).await;
        ledger
            .record_verified("order_1", &payment("pay_1", "order_1", 59_000))
            .await;

        let outcome = ledger
            .apply_webhook(&event(
                "refund.processed",
                serde_json::json!({
                    "refund": { "entity": { "id": "rfnd_1", "payment_id": "pay_1", "amount": 59000 }}
                }),
            ))
            .await;
        assert!(matches!(
            outcome,
            Reconciliation::Applied { state: OrderState::Refunded, .. }
        ));
        assert_eq!(
            ledger.get("order_1").await.unwrap().state,
            OrderState::Refunded
        );
    }

    #[tokio::test]
    async fn test_unhandled_events_are_ignored() {
        let ledger = OrderLedger::new();
        assert_eq!(
            ledger
                .apply_webhook(&event("subscription.charged", serde_json::json!({})))
                .await,
            Reconciliation::Ignored
        );
        assert_eq!(
            ledger
                .apply_webhook(&event("payment.captured", serde_json::json!({})))
                .await,
            Reconciliation::Ignored
        );
        assert!(ledger.is_empty().await);
    }
}
