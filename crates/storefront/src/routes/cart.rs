//! Cart route handlers.
//!
//! The cart lives in the visitor session. Prices are always taken from the
//! catalog, so a client can only say which product and how many.

use axum::{Json, extract::State};
use sakria_core::{Cart, CheckoutTotals, CurrencyCode, ProductId};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::session::{load_cart_store, save_cart_store};
use crate::state::AppState;

/// Cart plus the checkout summary shown next to it.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub cart: Cart,
    pub totals: CheckoutTotals,
    pub currency: CurrencyCode,
    /// Grand total formatted for display, e.g. `₹590.00`.
    pub display_total: String,
}

impl CartResponse {
    fn new(state: &AppState, cart: Cart) -> Self {
        let settings = state.config().checkout;
        let totals = CheckoutTotals::compute(cart.subtotal(), settings.tax_rate);
        Self {
            display_total: totals.total_price(settings.currency).display(),
            cart,
            totals,
            currency: settings.currency,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct RemoveFromCartRequest {
    pub product_id: ProductId,
}

/// Show the cart.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartResponse>> {
    let cart = load_cart_store(&session).await?.load();
    Ok(Json(CartResponse::new(&state, cart)))
}

/// Add one unit of a catalog product.
#[instrument(skip(state, session), fields(product_id = %request.product_id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<CartResponse>> {
    let product = state
        .catalog()
        .get(request.product_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("product {}", request.product_id)))?;

    if !product.in_stock {
        return Err(AppError::BadRequest(format!(
            "{} is out of stock",
            product.name
        )));
    }

    let mut store = load_cart_store(&session).await?;
    store.add_item(product);
    let cart = save_cart_store(&session, store).await?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", &request.product_id.to_string())]),
    );

    Ok(Json(CartResponse::new(&state, cart)))
}

/// Set a line's quantity. Values below 1 remove the line.
#[instrument(skip(state, session), fields(product_id = %request.product_id, quantity = request.quantity))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<UpdateCartRequest>,
) -> Result<Json<CartResponse>> {
    let mut store = load_cart_store(&session).await?;
    store.update_quantity(request.product_id, request.quantity);
    let cart = save_cart_store(&session, store).await?;
    Ok(Json(CartResponse::new(&state, cart)))
}

/// Remove a line. Removing a product that is not in the cart is a no-op.
#[instrument(skip(state, session), fields(product_id = %request.product_id))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<RemoveFromCartRequest>,
) -> Result<Json<CartResponse>> {
    let mut store = load_cart_store(&session).await?;
    store.remove_item(request.product_id);
    let cart = save_cart_store(&session, store).await?;

    add_breadcrumb(
        "cart",
        "Removed from cart",
        Some(&[("product_id", &request.product_id.to_string())]),
    );

    Ok(Json(CartResponse::new(&state, cart)))
}

/// Empty the cart.
#[instrument(skip(state, session))]
pub async fn clear(State(state): State<AppState>, session: Session) -> Result<Json<CartResponse>> {
    let mut store = load_cart_store(&session).await?;
    store.clear();
    let cart = save_cart_store(&session, store).await?;
    Ok(Json(CartResponse::new(&state, cart)))
}
