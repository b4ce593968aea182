//! `sakria checkout` - pay for the local cart.

use sakria_core::checkout::{CheckoutDetails, PaymentWidget, Prefill};
use sakria_core::{CartStore, CheckoutConfig, CheckoutReconciler, CheckoutStatus, Price};

use super::print_cart;
use crate::api::StorefrontApi;
use crate::store::FileStore;

/// Options for one checkout run.
#[derive(Debug, Default)]
pub struct CheckoutArgs {
    pub receipt: Option<String>,
    pub prefill: Prefill,
}

/// Run a checkout of the local cart and report the outcome.
///
/// # Errors
///
/// Returns an error if the checkout does not succeed, so the process exits
/// non-zero. A dismissed payment is not an error.
pub async fn run<W: PaymentWidget>(
    store: &mut CartStore<FileStore>,
    api: StorefrontApi,
    widget: W,
    config: CheckoutConfig,
    args: CheckoutArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let cart = store.load();
    if cart.is_empty() {
        println!("Your cart is empty. Add something with `sakria cart add <id>`.");
        return Ok(());
    }
    print_cart(&cart, config.currency, config.tax_rate);

    let details = args
        .receipt
        .map_or_else(CheckoutDetails::with_generated_receipt, CheckoutDetails::new)
        .with_prefill(args.prefill);

    let currency = config.currency;
    let reconciler = CheckoutReconciler::new(config, api.clone(), widget, api);
    let session = reconciler.checkout(store, details).await;

    match session.status() {
        CheckoutStatus::Succeeded => {
            let paid = session
                .payment()
                .map(|p| (p.id.clone(), Price::from_minor_units(p.amount, currency)));
            match paid {
                Some((id, amount)) => {
                    println!("Payment {id} of {} received. Thank you!", amount.display());
                }
                None => println!("Payment received. Thank you!"),
            }
            Ok(())
        }
        CheckoutStatus::Idle => {
            println!("Payment cancelled. Your cart is unchanged.");
            Ok(())
        }
        status => Err(format!(
            "checkout {status}: {}",
            session.failure_reason().unwrap_or("unknown error")
        )
        .into()),
    }
}
