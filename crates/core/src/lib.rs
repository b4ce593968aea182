//! Sakria Core - Cart and checkout library.
//!
//! This crate holds the stateful, rule-governed part of the Sakria Farm and
//! HomeStay store. It is shared by:
//! - `storefront` - HTTP server exposing the catalog, session carts and the payment API
//! - `cli` - Terminal client with a local cart and an interactive checkout
//!
//! # Architecture
//!
//! The core crate performs no network or file I/O. Cart persistence goes
//! through the [`cart::KeyValueStore`] trait and the payment gateway is
//! reached through the collaborator traits in [`checkout`], so every rule in
//! here can be exercised with in-memory fakes.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices and status enums
//! - [`cart`] - Cart model and the persisted Cart Store
//! - [`checkout`] - Tax/total computation and the checkout state machine

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod types;

pub use cart::{
    Cart, CartItem, CartRecordError, CartStore, KeyValueStore, MemoryStore, ProductRef,
};
pub use checkout::{
    CheckoutConfig, CheckoutError, CheckoutReconciler, CheckoutSession, CheckoutTotals,
};
pub use types::*;
