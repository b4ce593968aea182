//! `sakria cart` - the local cart.

use rust_decimal::Decimal;
use sakria_core::{CartStore, CurrencyCode, ProductId};
use tracing::info;

use super::print_cart;
use crate::api::StorefrontApi;
use crate::store::FileStore;

pub fn show(store: &CartStore<FileStore>, currency: CurrencyCode, tax_rate: Decimal) {
    print_cart(&store.load(), currency, tax_rate);
}

/// Add one unit of a product, looked up in the storefront catalog.
///
/// # Errors
///
/// Returns an error if the product cannot be fetched or is out of stock.
pub async fn add(
    store: &mut CartStore<FileStore>,
    api: &StorefrontApi,
    id: ProductId,
) -> Result<(), Box<dyn std::error::Error>> {
    let product = api.product(id).await?;
    if !product.in_stock {
        return Err(format!("{} is out of stock", product.name).into());
    }

    info!(product_id = %id, name = %product.name, "Adding to cart");
    let name = product.name.clone();
    let cart = store.add_item(product);
    println!("Added {name} ({} in cart).", cart.quantity_of(id));
    Ok(())
}

pub fn remove(store: &mut CartStore<FileStore>, id: ProductId) {
    let before = store.load();
    let cart = store.remove_item(id);
    if before.contains(id) {
        println!("Removed product {id}. {} item(s) left.", cart.item_count());
    } else {
        println!("Product {id} is not in your cart.");
    }
}

pub fn update(store: &mut CartStore<FileStore>, id: ProductId, quantity: i64) {
    let cart = store.update_quantity(id, quantity);
    match cart.get(id) {
        Some(item) => println!("{} quantity is now {}.", item.name, item.quantity),
        None => println!("Product {id} is not in your cart."),
    }
}

pub fn clear(store: &mut CartStore<FileStore>) {
    store.clear();
    println!("Cart cleared.");
}
