//! Integration test harness for the Sakria storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p sakria-integration-tests
//! ```
//!
//! The storefront router is driven in process with `tower::ServiceExt::oneshot`,
//! carrying the session cookie between requests like a browser would. Payment
//! routes talk to [`MockGateway`], a small Razorpay REST stand-in bound to a
//! loopback port, so nothing leaves the machine.
//!
//! # Test Categories
//!
//! - `cart_api` - session-backed cart endpoints
//! - `payment_api` - order creation, verification, webhooks and the ledger
//! - `checkout_flow` - the core checkout reconciler against the live router

// Harness setup failures should abort the test that hit them.
#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use sakria_core::checkout::{
    GatewayOrder, OrderRequest, OrderService, PaymentCompletion, PaymentDetails, PaymentVerifier,
    PaymentWidget, Verification, WidgetOptions, WidgetOutcome,
};
use sakria_core::{CheckoutError, CurrencyCode};
use sakria_storefront::config::{RazorpayConfig, StorefrontConfig};
use sakria_storefront::razorpay::sign;
use sakria_storefront::state::AppState;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tower::ServiceExt;

pub const KEY_ID: &str = "rzp_test_SakriaFarm01";
pub const KEY_SECRET: &str = "Kx9mQ2vL7pR4tW8zN3bC6dF1";
pub const WEBHOOK_SECRET: &str = "wh7Tq8vN2xL5mR9pK3sB7cJ4dF6";

/// Razorpay rejects orders below one rupee.
const MIN_ORDER_AMOUNT: u64 = 100;

// =============================================================================
// Mock Razorpay gateway
// =============================================================================

#[derive(Clone, Default)]
struct GatewayState {
    next_id: Arc<AtomicU64>,
    orders: Arc<Mutex<HashMap<String, Value>>>,
}

/// Razorpay REST stand-in serving `POST /v1/orders` and
/// `GET /v1/payments/{id}`.
///
/// Every order `order_X` has exactly one payment, `pay_X`, captured for the
/// full order amount.
pub struct MockGateway {
    base_url: String,
    state: GatewayState,
}

impl MockGateway {
    /// Bind to an ephemeral loopback port and serve until the test runtime
    /// shuts down.
    pub async fn start() -> Self {
        let state = GatewayState::default();
        let router = Router::new()
            .route("/v1/orders", post(gateway_create_order))
            .route("/v1/payments/{id}", get(gateway_fetch_payment))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock gateway");
        let addr = listener
            .local_addr()
            .expect("Mock gateway has no local address");

        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The order as the gateway stored it.
    pub async fn order(&self, id: &str) -> Option<Value> {
        self.state.orders.lock().await.get(id).cloned()
    }

    pub async fn order_count(&self) -> usize {
        self.state.orders.lock().await.len()
    }
}

/// Payment id the mock gateway pairs with `order_id`.
#[must_use]
pub fn payment_id_for(order_id: &str) -> String {
    order_id.replacen("order_", "pay_", 1)
}

fn gateway_error(status: StatusCode, description: &str) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "code": "BAD_REQUEST_ERROR",
                "description": description,
            }
        })),
    )
        .into_response()
}

fn is_authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "))
}

async fn gateway_create_order(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !is_authorized(&headers) {
        return gateway_error(StatusCode::UNAUTHORIZED, "Authentication failed");
    }

    let amount = body["amount"].as_u64().unwrap_or_default();
    if amount < MIN_ORDER_AMOUNT {
        return gateway_error(
            StatusCode::BAD_REQUEST,
            "Order amount less than minimum amount allowed",
        );
    }

    let n = state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
    let id = format!("order_Mock{n:06}");
    let order = json!({
        "id": id,
        "entity": "order",
        "amount": amount,
        "amount_paid": 0,
        "amount_due": amount,
        "currency": body["currency"],
        "receipt": body["receipt"],
        "status": "created",
        "attempts": 0,
        "notes": body["notes"],
        "created_at": 1_760_000_000 + n,
    });

    state.orders.lock().await.insert(id, order.clone());
    Json(order).into_response()
}

async fn gateway_fetch_payment(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !is_authorized(&headers) {
        return gateway_error(StatusCode::UNAUTHORIZED, "Authentication failed");
    }

    let order_id = id.replacen("pay_", "order_", 1);
    let Some(order) = state.orders.lock().await.get(&order_id).cloned() else {
        return gateway_error(StatusCode::BAD_REQUEST, "The id provided does not exist");
    };

    Json(json!({
        "id": id,
        "entity": "payment",
        "amount": order["amount"],
        "currency": order["currency"],
        "status": "captured",
        "order_id": order_id,
        "method": "upi",
        "captured": true,
        "email": "guest@sakriafarm.in",
        "contact": "+919876543210",
        "created_at": order["created_at"],
    }))
    .into_response()
}

// =============================================================================
// Signatures
// =============================================================================

/// Signature the checkout widget hands back for a genuine payment.
#[must_use]
pub fn checkout_signature(order_id: &str, payment_id: &str) -> String {
    sign(KEY_SECRET, format!("{order_id}|{payment_id}").as_bytes())
        .expect("HMAC accepts any key length")
}

/// Signature Razorpay puts on a webhook body.
#[must_use]
pub fn webhook_signature(body: &[u8]) -> String {
    sign(WEBHOOK_SECRET, body).expect("HMAC accepts any key length")
}

// =============================================================================
// Storefront under test
// =============================================================================

/// Configuration with Razorpay pointed at `gateway`.
#[must_use]
pub fn gateway_config(gateway: &MockGateway) -> StorefrontConfig {
    StorefrontConfig {
        razorpay: RazorpayConfig {
            key_id: Some(KEY_ID.to_string()),
            key_secret: Some(SecretString::from(KEY_SECRET.to_string())),
            webhook_secret: Some(SecretString::from(WEBHOOK_SECRET.to_string())),
            api_base: gateway.base_url().to_string(),
        },
        ..StorefrontConfig::default()
    }
}

/// A response with its body decoded as JSON (or as a JSON string when the
/// body is not JSON).
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// The `error` message of a failed request.
    #[must_use]
    pub fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}

/// Decimal serialized as a JSON string (or number).
#[must_use]
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        other => other.to_string().parse().expect("decimal number"),
    }
}

/// The storefront router plus one visitor's session cookie.
pub struct TestApp {
    router: Router,
    state: AppState,
    cookie: Mutex<Option<String>>,
}

impl TestApp {
    #[must_use]
    pub fn new(config: StorefrontConfig) -> Self {
        let state = AppState::new(config).expect("Failed to build app state");
        Self {
            router: sakria_storefront::app(state.clone()),
            state,
            cookie: Mutex::new(None),
        }
    }

    /// Storefront with no Razorpay credentials.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self::new(StorefrontConfig::default())
    }

    /// Storefront wired to a fresh mock gateway.
    pub async fn with_gateway() -> (Self, MockGateway) {
        let gateway = MockGateway::start().await;
        (Self::new(gateway_config(&gateway)), gateway)
    }

    /// Another visitor on the same storefront, starting without a session.
    #[must_use]
    pub fn new_visitor(&self) -> Self {
        Self {
            router: self.router.clone(),
            state: self.state.clone(),
            cookie: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Method::GET, path, &[], Body::empty()).await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> TestResponse {
        self.send(
            Method::POST,
            path,
            &[(header::CONTENT_TYPE.as_str(), "application/json")],
            Body::from(body.to_string()),
        )
        .await
    }

    /// POST raw bytes, for webhooks whose signature covers the exact body.
    pub async fn post_raw(&self, path: &str, body: Vec<u8>, headers: &[(&str, &str)]) -> TestResponse {
        self.send(Method::POST, path, headers, Body::from(body)).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
        body: Body,
    ) -> TestResponse {
        let mut request = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(cookie) = self.cookie.lock().await.clone() {
            request = request.header(header::COOKIE, cookie);
        }

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).expect("Failed to build request"))
            .await
            .expect("Router is infallible");

        // Keep only `name=value` from Set-Cookie, as a browser would send it.
        if let Some(pair) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
        {
            *self.cookie.lock().await = Some(pair.to_string());
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

// =============================================================================
// Checkout collaborators over the router
// =============================================================================

/// `OrderService` and `PaymentVerifier` backed by the storefront's payment
/// endpoints, the same way a browser client uses them.
#[derive(Clone)]
pub struct StorefrontPayments {
    app: Arc<TestApp>,
}

impl StorefrontPayments {
    #[must_use]
    pub const fn new(app: Arc<TestApp>) -> Self {
        Self { app }
    }
}

#[async_trait]
impl OrderService for StorefrontPayments {
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, CheckoutError> {
        let response = self
            .app
            .post_json(
                "/api/payment/create-order",
                &json!({
                    "amount": request.amount,
                    "currency": request.currency.code(),
                    "receipt": request.receipt,
                    "notes": request.notes,
                    "prefill": request.prefill,
                }),
            )
            .await;

        if !response.status.is_success() {
            let message = response.error().to_string();
            return Err(if response.body["setup_required"] == true {
                CheckoutError::Configuration(message)
            } else {
                CheckoutError::Transport(message)
            });
        }

        let order = &response.body["order"];
        Ok(GatewayOrder {
            id: order["id"].as_str().unwrap_or_default().to_string(),
            amount: order["amount"].as_u64().unwrap_or_default(),
            currency: order["currency"]
                .as_str()
                .unwrap_or_default()
                .parse::<CurrencyCode>()
                .map_err(CheckoutError::Transport)?,
        })
    }
}

#[async_trait]
impl PaymentVerifier for StorefrontPayments {
    async fn verify(&self, completion: &PaymentCompletion) -> Result<Verification, CheckoutError> {
        let response = self
            .app
            .post_json(
                "/api/payment/verify",
                &json!({
                    "razorpay_order_id": completion.order_id,
                    "razorpay_payment_id": completion.payment_id,
                    "razorpay_signature": completion.signature,
                }),
            )
            .await;

        match response.status {
            StatusCode::OK => {
                let payment = &response.body["payment"];
                Ok(Verification::Valid(PaymentDetails {
                    id: payment["id"].as_str().unwrap_or_default().to_string(),
                    amount: payment["amount"].as_u64().unwrap_or_default(),
                    method: payment["method"].as_str().unwrap_or_default().to_string(),
                }))
            }
            StatusCode::BAD_REQUEST => Ok(Verification::Invalid(response.error().to_string())),
            status => Err(CheckoutError::Transport(format!(
                "{} (HTTP {})",
                response.error(),
                status.as_u16()
            ))),
        }
    }
}

/// How the scripted widget behaves when opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shopper {
    /// Pays and returns a correctly signed completion.
    Pays,
    /// Pays but the completion carries a forged signature.
    Tampers,
    /// Closes the widget.
    Dismisses,
}

/// Payment widget that plays a scripted shopper and records what it was
/// opened with. Clones share the record.
#[derive(Clone)]
pub struct ScriptedWidget {
    shopper: Shopper,
    opened: Arc<Mutex<Vec<WidgetOptions>>>,
}

impl ScriptedWidget {
    #[must_use]
    pub fn new(shopper: Shopper) -> Self {
        Self {
            shopper,
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn opened(&self) -> Vec<WidgetOptions> {
        self.opened.lock().await.clone()
    }
}

#[async_trait]
impl PaymentWidget for ScriptedWidget {
    async fn open(&self, options: &WidgetOptions) -> WidgetOutcome {
        self.opened.lock().await.push(options.clone());

        let payment_id = payment_id_for(&options.order_id);
        let signature = match self.shopper {
            Shopper::Dismisses => return WidgetOutcome::Dismissed,
            Shopper::Pays => checkout_signature(&options.order_id, &payment_id),
            Shopper::Tampers => checkout_signature(&options.order_id, "pay_Forged"),
        };

        WidgetOutcome::Completed(PaymentCompletion {
            order_id: options.order_id.clone(),
            payment_id,
            signature,
        })
    }
}
