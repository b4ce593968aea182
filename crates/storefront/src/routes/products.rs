//! Product catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use sakria_core::{ProductId, ProductRef};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Query parameters for the product listing.
#[derive(Debug, Deserialize)]
pub struct ProductsQuery {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<ProductRef>,
}

/// List the catalog, optionally filtered by category.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductsQuery>,
) -> Json<ProductList> {
    let products = state
        .catalog()
        .list(query.category.as_deref())
        .cloned()
        .collect();
    Json(ProductList { products })
}

/// Show a single product.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductRef>> {
    state
        .catalog()
        .get(id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}
