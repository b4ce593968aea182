//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                       - Health check
//!
//! # Products
//! GET  /api/products                 - Catalog listing (?category=Dairy)
//! GET  /api/products/{id}            - Single product
//!
//! # Cart (session-backed, JSON)
//! GET  /api/cart                     - Cart with tax and total
//! POST /api/cart/add                 - Add one unit of a product
//! POST /api/cart/update              - Set a line's quantity (0 removes)
//! POST /api/cart/remove              - Remove a line
//! POST /api/cart/clear               - Empty the cart
//!
//! # Payment (Razorpay)
//! POST /api/payment/create-order     - Create a gateway order
//! POST /api/payment/verify           - Verify a checkout signature
//! POST /api/payment/webhook          - Gateway webhook
//! GET  /api/payment/test             - Report which credentials are set
//! GET  /api/payment/orders/{id}      - Ledger record for an order
//! ```

pub mod cart;
pub mod payment;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
}

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(payment::create_order))
        .route("/verify", post(payment::verify))
        .route("/webhook", post(payment::webhook))
        .route("/test", get(payment::test))
        .route("/orders/{id}", get(payment::order_status))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/api/products", product_routes())
        .nest("/api/cart", cart_routes())
        .nest("/api/payment", payment_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running.
async fn health() -> &'static str {
    "ok"
}
