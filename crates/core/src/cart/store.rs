//! Persisted Cart Store.
//!
//! The store is the single writer of the persisted cart. It never reports
//! errors outward: unreadable or corrupt data loads as the empty cart, and a
//! failed write is logged while the updated cart is still returned so the
//! caller's view stays consistent with the action it just took.

use std::collections::HashMap;
use std::convert::Infallible;

use tracing::{debug, instrument, warn};

use super::{Cart, ProductRef};
use crate::types::ProductId;

/// Key the cart is persisted under.
pub const CART_STORAGE_KEY: &str = "cart";

/// A string key-value store, such as browser local storage, a session, or a
/// file on disk.
pub trait KeyValueStore {
    type Error: std::error::Error;

    /// Read the value for `key`, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if it cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if it cannot be written.
    fn set(&mut self, key: &str, value: String) -> Result<(), Self::Error>;
}

/// In-memory `KeyValueStore`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with one entry.
    #[must_use]
    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(key.into(), value.into());
        Self { entries }
    }

    /// Take the value for `key` out of the store.
    pub fn take(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }
}

impl KeyValueStore for MemoryStore {
    type Error = Infallible;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), Self::Error> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Cart Store: load, mutate and persist the cart through a `KeyValueStore`.
///
/// Every mutation reads the persisted cart, applies the change (which
/// recomputes derived totals), writes it back and returns the new cart.
#[derive(Debug)]
pub struct CartStore<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> CartStore<S> {
    /// Create a cart store persisting under [`CART_STORAGE_KEY`].
    pub fn new(store: S) -> Self {
        Self::with_key(store, CART_STORAGE_KEY)
    }

    /// Create a cart store persisting under a custom key.
    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Read the persisted cart, or the empty cart if there is none or it
    /// cannot be parsed.
    #[must_use]
    pub fn load(&self) -> Cart {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Cart::empty(),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read persisted cart");
                return Cart::empty();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(key = %self.key, error = %e, "Discarding unparsable persisted cart");
            Cart::empty()
        })
    }

    /// Add one unit of `product`.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub fn add_item(&mut self, product: ProductRef) -> Cart {
        self.mutate(|cart| cart.add(product))
    }

    /// Remove the line for `id`; absent ids are a no-op.
    #[instrument(skip(self))]
    pub fn remove_item(&mut self, id: ProductId) -> Cart {
        self.mutate(|cart| {
            cart.remove(id);
        })
    }

    /// Set the quantity of `id` to `max(0, quantity)`, removing the line at 0.
    #[instrument(skip(self))]
    pub fn update_quantity(&mut self, id: ProductId, quantity: i64) -> Cart {
        self.mutate(|cart| cart.set_quantity(id, quantity))
    }

    /// Reset to the empty cart.
    #[instrument(skip(self))]
    pub fn clear(&mut self) -> Cart {
        self.mutate(Cart::clear)
    }

    /// Borrow the backing store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Give back the backing store.
    pub fn into_inner(self) -> S {
        self.store
    }

    fn mutate(&mut self, change: impl FnOnce(&mut Cart)) -> Cart {
        let mut cart = self.load();
        change(&mut cart);
        self.save(&cart);
        debug!(
            items = cart.items().len(),
            item_count = cart.item_count(),
            subtotal = %cart.subtotal(),
            "Cart updated"
        );
        cart
    }

    fn save(&mut self, cart: &Cart) {
        let raw = match serde_json::to_string(cart) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to serialize cart");
                return;
            }
        };

        if let Err(e) = self.store.set(&self.key, raw) {
            warn!(key = %self.key, error = %e, "Failed to persist cart");
        }
    }
}
