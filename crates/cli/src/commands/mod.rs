//! Subcommand implementations.

pub mod cart;
pub mod checkout;
pub mod status;

use rust_decimal::Decimal;
use sakria_core::{Cart, CheckoutTotals, CurrencyCode, Price};

/// Print the cart lines and the checkout summary.
pub fn print_cart(cart: &Cart, currency: CurrencyCode, tax_rate: Decimal) {
    if cart.is_empty() {
        println!("Your cart is empty.");
        return;
    }

    let money = |amount: Decimal| Price::new(amount, currency).display();

    for item in cart.items() {
        println!(
            "  {:>4}  {:<28} {:>3} x {:>12} = {:>12}",
            item.id,
            item.name,
            item.quantity,
            money(item.unit_price),
            money(item.line_total()),
        );
    }

    let totals = CheckoutTotals::compute(cart.subtotal(), tax_rate);
    println!();
    println!("  Items:    {}", cart.item_count());
    println!("  Subtotal: {}", money(totals.subtotal));
    println!("  Tax:      {}", money(totals.tax));
    println!("  Total:    {}", money(totals.total));
}
