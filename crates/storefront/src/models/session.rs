//! The session-backed cart.
//!
//! The cart is stored in the session as the same JSON string a browser
//! client keeps in local storage, under the same key. Each request hydrates a
//! [`MemoryStore`] from the session, runs the core [`CartStore`] operation on
//! it, and writes the result back.

use sakria_core::cart::CART_STORAGE_KEY;
use sakria_core::{Cart, CartStore, MemoryStore};
use tower_sessions::Session;

/// Session keys.
pub mod keys {
    /// Key for the serialized cart.
    pub const CART: &str = sakria_core::cart::CART_STORAGE_KEY;
}

/// Build a cart store over the cart currently held in `session`.
///
/// # Errors
///
/// Returns an error if the session store cannot be read.
pub async fn load_cart_store(
    session: &Session,
) -> Result<CartStore<MemoryStore>, tower_sessions::session::Error> {
    let store = match session.get::<String>(keys::CART).await? {
        Some(raw) => MemoryStore::with_entry(CART_STORAGE_KEY, raw),
        None => MemoryStore::new(),
    };
    Ok(CartStore::new(store))
}

/// Write the store's cart back to `session` and return it.
///
/// # Errors
///
/// Returns an error if the session store cannot be written.
pub async fn save_cart_store(
    session: &Session,
    cart_store: CartStore<MemoryStore>,
) -> Result<Cart, tower_sessions::session::Error> {
    let cart = cart_store.load();
    let mut store = cart_store.into_inner();
    match store.take(CART_STORAGE_KEY) {
        Some(raw) => session.insert(keys::CART, raw).await?,
        None => {
            session.remove::<String>(keys::CART).await?;
        }
    }
    Ok(cart)
}
