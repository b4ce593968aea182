//! `sakria status` - check the storefront payment setup.

use crate::api::StorefrontApi;

/// Print which payment credentials the storefront has.
///
/// # Errors
///
/// Returns an error if the storefront cannot be reached.
pub async fn run(api: &StorefrontApi) -> Result<(), Box<dyn std::error::Error>> {
    let status = api.payment_status().await?;
    let mark = |set: bool| if set { "set" } else { "MISSING" };

    println!("{}", status.message);
    println!("  RAZORPAY_KEY_ID:         {}", mark(status.environment.has_key_id));
    println!("  RAZORPAY_KEY_SECRET:     {}", mark(status.environment.has_key_secret));
    println!("  RAZORPAY_WEBHOOK_SECRET: {}", mark(status.environment.has_webhook_secret));
    Ok(())
}
