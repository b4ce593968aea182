//! Checkout Reconciler: turns a cart into a payment outcome.
//!
//! Every failure inside the flow is caught here and recorded on the session
//! as `Failed` with a reason; nothing propagates into the Cart Store. The
//! cart is cleared only after the verifier reports a valid payment.

use std::collections::BTreeMap;

use tracing::{error, info, instrument, warn};

use super::{
    CheckoutConfig, CheckoutError, CheckoutEvent, CheckoutSession, GatewayOrder, OrderRequest,
    OrderService, PaymentVerifier, PaymentWidget, Prefill, Verification, WidgetOptions,
    WidgetOutcome,
};
use crate::cart::{Cart, CartStore, KeyValueStore};
use crate::types::CheckoutStatus;

/// Caller-supplied details for one checkout attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutDetails {
    /// Receipt reference passed to the gateway.
    pub receipt: String,
    pub notes: BTreeMap<String, String>,
    pub prefill: Prefill,
}

impl CheckoutDetails {
    #[must_use]
    pub fn new(receipt: impl Into<String>) -> Self {
        Self {
            receipt: receipt.into(),
            ..Self::default()
        }
    }

    /// Details with a receipt of the form `order_<unix millis>`.
    #[must_use]
    pub fn with_generated_receipt() -> Self {
        Self::new(format!("order_{}", chrono::Utc::now().timestamp_millis()))
    }

    #[must_use]
    pub fn with_prefill(mut self, prefill: Prefill) -> Self {
        self.prefill = prefill;
        self
    }

    #[must_use]
    pub fn with_note(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.notes.insert(key.into(), value.into());
        self
    }
}

/// Drives a checkout session through order creation, the payment widget and
/// signature verification.
pub struct CheckoutReconciler<O, W, V> {
    config: CheckoutConfig,
    orders: O,
    widget: W,
    verifier: V,
}

impl<O, W, V> CheckoutReconciler<O, W, V>
where
    O: OrderService,
    W: PaymentWidget,
    V: PaymentVerifier,
{
    pub const fn new(config: CheckoutConfig, orders: O, widget: W, verifier: V) -> Self {
        Self {
            config,
            orders,
            widget,
            verifier,
        }
    }

    pub const fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// A fresh `Idle` session for `cart`, with tax and total fixed now.
    #[must_use]
    pub fn begin(&self, cart: Cart) -> CheckoutSession {
        CheckoutSession::new(cart, self.config.tax_rate)
    }

    /// Run one full checkout of the cart held in `cart_store`.
    ///
    /// Returns the session in one of three states: `Succeeded` (cart
    /// cleared), `Failed` (cart untouched, `failure_reason` set) or `Idle`
    /// (widget dismissed, cart untouched).
    #[instrument(skip_all, fields(receipt = %details.receipt))]
    pub async fn checkout<S: KeyValueStore>(
        &self,
        cart_store: &mut CartStore<S>,
        details: CheckoutDetails,
    ) -> CheckoutSession {
        let mut session = self.begin(cart_store.load());
        advance(&mut session, CheckoutEvent::Start);

        info!(
            subtotal = %session.totals().subtotal,
            tax = %session.tax(),
            total = %session.total(),
            "Checkout started"
        );

        let order = match self.create_order(&session, &details).await {
            Ok(order) => order,
            Err(e) => {
                warn!(error = %e, "Order creation failed");
                advance(&mut session, CheckoutEvent::OrderFailed(e.to_string()));
                return session;
            }
        };
        advance(&mut session, CheckoutEvent::OrderCreated(order.id.clone()));

        let options = self.widget_options(&order, &details);
        let completion = match self.widget.open(&options).await {
            WidgetOutcome::Completed(completion) => completion,
            WidgetOutcome::Dismissed => {
                info!(order_id = %order.id, "Payment widget dismissed");
                advance(&mut session, CheckoutEvent::WidgetDismissed);
                return session;
            }
        };

        if completion.order_id != order.id {
            let e = CheckoutError::Integrity(format!(
                "payment belongs to order {} but checkout created {}",
                completion.order_id, order.id
            ));
            warn!(error = %e, "Rejecting payment for a different order");
            advance(&mut session, CheckoutEvent::VerificationFailed(e.to_string()));
            return session;
        }

        match self.verifier.verify(&completion).await {
            Ok(Verification::Valid(payment)) => {
                info!(
                    order_id = %order.id,
                    payment_id = %payment.id,
                    method = %payment.method,
                    "Payment verified"
                );
                advance(&mut session, CheckoutEvent::PaymentVerified(payment));
                if session.status() == CheckoutStatus::Succeeded {
                    cart_store.clear();
                }
            }
            Ok(Verification::Invalid(reason)) => {
                let e = CheckoutError::Integrity(reason);
                warn!(order_id = %order.id, error = %e, "Payment signature rejected");
                advance(&mut session, CheckoutEvent::VerificationFailed(e.to_string()));
            }
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Payment verification unavailable");
                advance(&mut session, CheckoutEvent::VerificationFailed(e.to_string()));
            }
        }

        session
    }

    async fn create_order(
        &self,
        session: &CheckoutSession,
        details: &CheckoutDetails,
    ) -> Result<GatewayOrder, CheckoutError> {
        self.config.validate()?;

        let amount = session
            .totals()
            .total_price(self.config.currency)
            .minor_units()
            .map_err(|e| CheckoutError::Validation(e.to_string()))?;

        let request = OrderRequest::new(amount, self.config.currency, details.receipt.clone())?
            .with_notes(details.notes.clone())
            .with_prefill(details.prefill.clone());

        self.orders.create_order(&request).await
    }

    fn widget_options(&self, order: &GatewayOrder, details: &CheckoutDetails) -> WidgetOptions {
        let merchant = &self.config.merchant;
        let mut notes = details.notes.clone();
        notes.insert("address".to_string(), merchant.address.clone());

        WidgetOptions {
            key: self.config.gateway_key.clone(),
            order_id: order.id.clone(),
            amount: order.amount,
            currency: order.currency,
            name: merchant.name.clone(),
            description: merchant.description.clone(),
            image: merchant.image.clone(),
            prefill: details.prefill.clone(),
            notes,
            theme_color: merchant.theme_color.clone(),
        }
    }
}

/// Apply an event the reconciler itself sequenced.
fn advance(session: &mut CheckoutSession, event: CheckoutEvent) {
    if let Err(e) = session.apply(event) {
        error!(error = %e, "Checkout sequenced an invalid transition");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use super::*;
    use crate::cart::MemoryStore;
    use crate::cart::tests::product;
    use crate::checkout::{PaymentCompletion, PaymentDetails};
    use crate::types::CurrencyCode;

    #[derive(Default)]
    struct FakeOrders {
        fail_with: Option<CheckoutError>,
        requests: Mutex<Vec<OrderRequest>>,
    }

    #[async_trait]
    impl OrderService for FakeOrders {
        async fn create_order(
            &self,
            request: &OrderRequest,
        ) -> Result<GatewayOrder, CheckoutError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(e) = &self.fail_with {
                return Err(e.clone());
            }
            Ok(GatewayOrder {
                id: "order_test_1".to_string(),
                amount: request.amount,
                currency: request.currency,
            })
        }
    }

    enum WidgetScript {
        Pay,
        PayForOtherOrder,
        Dismiss,
    }

    struct FakeWidget {
        script: WidgetScript,
        opened: Mutex<Vec<WidgetOptions>>,
    }

    impl FakeWidget {
        fn new(script: WidgetScript) -> Self {
            Self {
                script,
                opened: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PaymentWidget for FakeWidget {
        async fn open(&self, options: &WidgetOptions) -> WidgetOutcome {
            self.opened.lock().unwrap().push(options.clone());
            let order_id = match self.script {
                WidgetScript::Dismiss => return WidgetOutcome::Dismissed,
                WidgetScript::Pay => options.order_id.clone(),
                WidgetScript::PayForOtherOrder => "order_someone_else".to_string(),
            };
            WidgetOutcome::Completed(PaymentCompletion {
                order_id,
                payment_id: "pay_test_1".to_string(),
                signature: "sig".to_string(),
            })
        }
    }

    enum VerifierScript {
        Valid,
        Invalid,
        Unreachable,
    }

    struct FakeVerifier {
        script: VerifierScript,
        calls: Mutex<u32>,
    }

    impl FakeVerifier {
        fn new(script: VerifierScript) -> Self {
            Self {
                script,
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl PaymentVerifier for FakeVerifier {
        async fn verify(
            &self,
            completion: &PaymentCompletion,
        ) -> Result<Verification, CheckoutError> {
            *self.calls.lock().unwrap() += 1;
            match self.script {
                VerifierScript::Valid => Ok(Verification::Valid(PaymentDetails {
                    id: completion.payment_id.clone(),
                    amount: 59_000,
                    method: "card".to_string(),
                })),
                VerifierScript::Invalid => {
                    Ok(Verification::Invalid("Invalid payment signature".to_string()))
                }
                VerifierScript::Unreachable => {
                    Err(CheckoutError::Transport("connection refused".to_string()))
                }
            }
        }
    }

    type TestReconciler = CheckoutReconciler<FakeOrders, FakeWidget, FakeVerifier>;

    fn build(widget: WidgetScript, verifier: VerifierScript) -> TestReconciler {
        CheckoutReconciler::new(
            CheckoutConfig::new("rzp_test_key"),
            FakeOrders::default(),
            FakeWidget::new(widget),
            FakeVerifier::new(verifier),
        )
    }

    fn scenario_store() -> CartStore<MemoryStore> {
        let mut store = CartStore::new(MemoryStore::new());
        store.add_item(product(1, 150));
        store.add_item(product(1, 150));
        store.add_item(product(2, 200));
        store
    }

    #[tokio::test]
    async fn test_successful_checkout_clears_cart() {
        let reconciler = build(WidgetScript::Pay, VerifierScript::Valid);
        let mut store = scenario_store();

        let session = reconciler
            .checkout(&mut store, CheckoutDetails::new("order_receipt_1"))
            .await;

        assert_eq!(session.status(), CheckoutStatus::Succeeded);
        assert_eq!(session.external_order_id(), Some("order_test_1"));
        assert_eq!(session.payment().unwrap().id, "pay_test_1");
        assert_eq!(session.cart_snapshot().subtotal(), Decimal::from(500));
        assert_eq!(store.load(), Cart::empty());
    }

    #[tokio::test]
    async fn test_order_amount_is_in_minor_units() {
        let reconciler = build(WidgetScript::Pay, VerifierScript::Valid);
        let mut store = scenario_store();
        let details = CheckoutDetails::new("order_receipt_1").with_note("payment_method", "upi");

        let session = reconciler.checkout(&mut store, details).await;

        assert_eq!(session.tax(), Decimal::from(90));
        assert_eq!(session.total(), Decimal::from(590));
        let requests = reconciler.orders.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].amount, 59_000);
        assert_eq!(requests[0].currency, CurrencyCode::INR);
        assert_eq!(requests[0].receipt, "order_receipt_1");
        assert_eq!(requests[0].notes["payment_method"], "upi");
    }

    #[tokio::test]
    async fn test_widget_receives_order_and_branding() {
        let reconciler = build(WidgetScript::Pay, VerifierScript::Valid);
        let mut store = scenario_store();
        let prefill = Prefill {
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            contact: "9999999999".to_string(),
        };

        reconciler
            .checkout(
                &mut store,
                CheckoutDetails::new("r1").with_prefill(prefill.clone()),
            )
            .await;

        let opened = reconciler.widget.opened.lock().unwrap();
        let options = &opened[0];
        assert_eq!(options.key, "rzp_test_key");
        assert_eq!(options.order_id, "order_test_1");
        assert_eq!(options.amount, 59_000);
        assert_eq!(options.prefill, prefill);
        assert_eq!(options.theme_color, "#16a34a");
        assert!(options.notes.contains_key("address"));
    }

    #[tokio::test]
    async fn test_dismissed_widget_returns_to_idle() {
        let reconciler = build(WidgetScript::Dismiss, VerifierScript::Valid);
        let mut store = scenario_store();

        let session = reconciler.checkout(&mut store, CheckoutDetails::new("r1")).await;

        assert_eq!(session.status(), CheckoutStatus::Idle);
        assert_eq!(session.failure_reason(), None);
        assert_eq!(store.load().subtotal(), Decimal::from(500));
        assert_eq!(*reconciler.verifier.calls.lock().unwrap(), 0);

        // A dismissed attempt does not block the next one.
        let retry = build(WidgetScript::Pay, VerifierScript::Valid)
            .checkout(&mut store, CheckoutDetails::new("r2"))
            .await;
        assert_eq!(retry.status(), CheckoutStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_invalid_signature_fails_and_keeps_cart() {
        let reconciler = build(WidgetScript::Pay, VerifierScript::Invalid);
        let mut store = scenario_store();

        let session = reconciler.checkout(&mut store, CheckoutDetails::new("r1")).await;

        assert_eq!(session.status(), CheckoutStatus::Failed);
        assert!(
            session
                .failure_reason()
                .unwrap()
                .contains("Invalid payment signature")
        );
        assert_eq!(store.load().subtotal(), Decimal::from(500));
        assert_eq!(store.load().item_count(), 3);
    }

    #[tokio::test]
    async fn test_verifier_error_fails_and_keeps_cart() {
        let reconciler = build(WidgetScript::Pay, VerifierScript::Unreachable);
        let mut store = scenario_store();

        let session = reconciler.checkout(&mut store, CheckoutDetails::new("r1")).await;

        assert_eq!(session.status(), CheckoutStatus::Failed);
        assert!(session.failure_reason().unwrap().contains("connection refused"));
        assert!(!store.load().is_empty());
    }

    #[tokio::test]
    async fn test_payment_for_other_order_is_rejected() {
        let reconciler = build(WidgetScript::PayForOtherOrder, VerifierScript::Valid);
        let mut store = scenario_store();

        let session = reconciler.checkout(&mut store, CheckoutDetails::new("r1")).await;

        assert_eq!(session.status(), CheckoutStatus::Failed);
        assert_eq!(*reconciler.verifier.calls.lock().unwrap(), 0);
        assert!(!store.load().is_empty());
    }

    #[tokio::test]
    async fn test_order_service_error_fails_without_retry() {
        let reconciler = CheckoutReconciler::new(
            CheckoutConfig::new("rzp_test_key"),
            FakeOrders {
                fail_with: Some(CheckoutError::Transport("timed out".to_string())),
                ..FakeOrders::default()
            },
            FakeWidget::new(WidgetScript::Pay),
            FakeVerifier::new(VerifierScript::Valid),
        );
        let mut store = scenario_store();

        let session = reconciler.checkout(&mut store, CheckoutDetails::new("r1")).await;

        assert_eq!(session.status(), CheckoutStatus::Failed);
        assert_eq!(
            session.failure_reason(),
            Some("payment service error: timed out")
        );
        assert_eq!(reconciler.orders.requests.lock().unwrap().len(), 1);
        assert!(reconciler.widget.opened.lock().unwrap().is_empty());
        assert!(!store.load().is_empty());
    }

    #[tokio::test]
    async fn test_missing_gateway_key_fails_before_order_call() {
        let reconciler = CheckoutReconciler::new(
            CheckoutConfig::new(""),
            FakeOrders::default(),
            FakeWidget::new(WidgetScript::Pay),
            FakeVerifier::new(VerifierScript::Valid),
        );
        let mut store = scenario_store();

        let session = reconciler.checkout(&mut store, CheckoutDetails::new("r1")).await;

        assert_eq!(session.status(), CheckoutStatus::Failed);
        assert!(session.failure_reason().unwrap().contains("not configured"));
        assert!(reconciler.orders.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected_before_order_call() {
        let reconciler = build(WidgetScript::Pay, VerifierScript::Valid);
        let mut store = CartStore::new(MemoryStore::new());

        let session = reconciler.checkout(&mut store, CheckoutDetails::new("r1")).await;

        assert_eq!(session.status(), CheckoutStatus::Failed);
        assert_eq!(
            session.failure_reason(),
            Some("invalid order: amount is required")
        );
        assert!(reconciler.orders.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_generated_receipt_format() {
        let details = CheckoutDetails::with_generated_receipt();
        let millis = details.receipt.strip_prefix("order_").unwrap();
        assert!(millis.parse::<i64>().is_ok());
    }
}
