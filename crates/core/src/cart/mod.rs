//! Shopping cart model and its persisted store.
//!
//! [`Cart`] keeps its items private so that `subtotal` and `item_count` can
//! only ever be derived from them: every mutator recomputes both, and
//! deserialization goes through the same path, so totals written by an older
//! client (or edited by hand) are never trusted.

mod store;

pub use store::{CART_STORAGE_KEY, CartStore, KeyValueStore, MemoryStore};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ProductId;

/// A product as offered on the site, before it is put in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    pub id: ProductId,
    pub name: String,
    #[serde(alias = "price")]
    pub unit_price: Decimal,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub organic: bool,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

const fn default_in_stock() -> bool {
    true
}

/// One cart line. `quantity` is at least 1 for as long as the line exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: ProductId,
    pub name: String,
    #[serde(alias = "price")]
    pub unit_price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub organic: bool,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CartItem {
    /// Build a cart line for `product` with the given quantity.
    #[must_use]
    pub fn from_product(product: ProductRef, quantity: u32) -> Self {
        Self {
            id: product.id,
            name: product.name,
            unit_price: product.unit_price,
            quantity,
            category: product.category,
            organic: product.organic,
            in_stock: product.in_stock,
            image: product.image,
            description: product.description,
        }
    }

    /// `unit_price × quantity`, saturating at `Decimal::MAX`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price.saturating_mul(Decimal::from(self.quantity))
    }

    fn checked_line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Why a persisted cart was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartRecordError {
    #[error("product {0} has a negative unit price")]
    NegativePrice(ProductId),
    #[error("cart total overflows")]
    Overflow,
}

/// The shopping cart: insertion-ordered lines with unique ids, plus totals
/// derived from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "CartRecord")]
pub struct Cart {
    items: Vec<CartItem>,
    subtotal: Decimal,
    item_count: u32,
}

/// Wire shape accepted when reading a persisted cart. Stored totals
/// (`subtotal`, or `total` from the older layout, and `itemCount`) are
/// ignored and recomputed. Lines with a negative price, or totals that do
/// not fit in a `Decimal`, reject the whole record.
#[derive(Deserialize)]
struct CartRecord {
    #[serde(default)]
    items: Vec<CartItem>,
}

impl TryFrom<CartRecord> for Cart {
    type Error = CartRecordError;

    fn try_from(record: CartRecord) -> Result<Self, Self::Error> {
        if let Some(item) = record.items.iter().find(|item| item.unit_price < Decimal::ZERO) {
            return Err(CartRecordError::NegativePrice(item.id));
        }

        let cart = Self::from_items(record.items);
        cart.items
            .iter()
            .try_fold(Decimal::ZERO, |sum, item| {
                item.checked_line_total().and_then(|line| sum.checked_add(line))
            })
            .ok_or(CartRecordError::Overflow)?;
        Ok(cart)
    }
}

impl Default for Cart {
    fn default() -> Self {
        Self::empty()
    }
}

impl Cart {
    /// `{items: [], subtotal: 0, itemCount: 0}`.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            subtotal: Decimal::ZERO,
            item_count: 0,
        }
    }

    /// Build a cart from arbitrary lines.
    ///
    /// Zero-quantity lines are dropped and repeated ids are merged into the
    /// first occurrence, so the result always satisfies the cart invariants.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut merged: Vec<CartItem> = Vec::new();
        for item in items {
            if item.quantity == 0 {
                continue;
            }
            match merged.iter_mut().find(|existing| existing.id == item.id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(item.quantity);
                }
                None => merged.push(item),
            }
        }

        let mut cart = Self {
            items: merged,
            ..Self::empty()
        };
        cart.recompute();
        cart
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Σ(unit price × quantity) over all lines.
    #[must_use]
    pub const fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    /// Σ(quantity) over all lines.
    #[must_use]
    pub const fn item_count(&self) -> u32 {
        self.item_count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: ProductId) -> bool {
        self.get(id).is_some()
    }

    /// Quantity of `id` in the cart, 0 if absent.
    #[must_use]
    pub fn quantity_of(&self, id: ProductId) -> u32 {
        self.get(id).map_or(0, |item| item.quantity)
    }

    /// Add one unit of `product`: bumps the existing line or appends a new
    /// line with quantity 1.
    pub fn add(&mut self, product: ProductRef) {
        match self.items.iter_mut().find(|item| item.id == product.id) {
            Some(item) => item.quantity = item.quantity.saturating_add(1),
            None => self.items.push(CartItem::from_product(product, 1)),
        }
        self.recompute();
    }

    /// Remove the line for `id`. Returns whether a line was removed.
    pub fn remove(&mut self, id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.recompute();
        self.items.len() != before
    }

    /// Set the quantity of `id` to `max(0, quantity)`; a resulting 0 removes
    /// the line. Unknown ids are ignored.
    pub fn set_quantity(&mut self, id: ProductId, quantity: i64) {
        let clamped = u32::try_from(quantity.max(0)).unwrap_or(u32::MAX);
        if clamped == 0 {
            self.items.retain(|item| item.id != id);
        } else if let Some(item) = self.items.iter_mut().find(|item| item.id == id) {
            item.quantity = clamped;
        }
        self.recompute();
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.recompute();
    }

    fn recompute(&mut self) {
        self.subtotal = self
            .items
            .iter()
            .fold(Decimal::ZERO, |sum, item| sum.saturating_add(item.line_total()));
        self.item_count = self
            .items
            .iter()
            .fold(0u32, |count, item| count.saturating_add(item.quantity));
    }
}
