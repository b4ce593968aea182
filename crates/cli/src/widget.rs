//! Terminal stand-in for the hosted checkout widget.
//!
//! Prints the options the hosted widget would be opened with, then waits for
//! the completion values (`order_id payment_id signature`) on the input
//! stream. An empty line or end of input dismisses the widget.

use async_trait::async_trait;
use sakria_core::Price;
use sakria_core::checkout::{PaymentCompletion, PaymentWidget, WidgetOptions, WidgetOutcome};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::Mutex;
use tracing::warn;

pub struct TerminalWidget<R> {
    input: Mutex<R>,
}

impl<R> TerminalWidget<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(input: R) -> Self {
        Self {
            input: Mutex::new(input),
        }
    }

    async fn read_line(&self) -> Option<String> {
        let mut line = String::new();
        let mut input = self.input.lock().await;
        match input.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => Some(line),
            Err(e) => {
                warn!(error = %e, "Failed to read payment completion");
                None
            }
        }
    }
}

fn print_options(options: &WidgetOptions) {
    let amount = Price::from_minor_units(options.amount, options.currency);

    println!();
    println!("  {} - {}", options.name, options.description);
    println!("  Order:    {}", options.order_id);
    println!("  Amount:   {} ({} minor units)", amount.display(), options.amount);
    println!("  Key:      {}", options.key);
    if !options.prefill.email.is_empty() || !options.prefill.contact.is_empty() {
        println!(
            "  Customer: {} {} {}",
            options.prefill.name, options.prefill.email, options.prefill.contact
        );
    }
    for (key, value) in &options.notes {
        println!("  Note:     {key} = {value}");
    }
    println!();
    println!("Complete the payment in the Razorpay checkout, then paste");
    println!("  <razorpay_order_id> <razorpay_payment_id> <razorpay_signature>");
    println!("or press Enter to cancel.");
}

/// Parse the completion triple. Fields may be separated by whitespace,
/// commas or `|`.
fn parse_completion(line: &str) -> Option<PaymentCompletion> {
    let parts: Vec<&str> = line
        .split(|c: char| c.is_whitespace() || c == ',' || c == '|')
        .filter(|p| !p.is_empty())
        .collect();

    match parts.as_slice() {
        [order_id, payment_id, signature] => Some(PaymentCompletion {
            order_id: (*order_id).to_string(),
            payment_id: (*payment_id).to_string(),
            signature: (*signature).to_string(),
        }),
        _ => None,
    }
}

#[async_trait]
impl<R> PaymentWidget for TerminalWidget<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn open(&self, options: &WidgetOptions) -> WidgetOutcome {
        print_options(options);

        loop {
            let Some(line) = self.read_line().await else {
                return WidgetOutcome::Dismissed;
            };
            if line.trim().is_empty() {
                return WidgetOutcome::Dismissed;
            }
            match parse_completion(&line) {
                Some(completion) => return WidgetOutcome::Completed(completion),
                None => println!("Expected three values: order id, payment id, signature."),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use sakria_core::CurrencyCode;
    use sakria_core::checkout::Prefill;

    use super::*;

    fn options() -> WidgetOptions {
        WidgetOptions {
            key: "rzp_test_abc".to_string(),
            order_id: "order_1".to_string(),
            amount: 59_000,
            currency: CurrencyCode::INR,
            name: "Sakria Farm and HomeStay".to_string(),
            description: "Farm Products & Accommodation".to_string(),
            image: "/images/garden.jpg".to_string(),
            prefill: Prefill::default(),
            notes: BTreeMap::new(),
            theme_color: "#16a34a".to_string(),
        }
    }

    #[test]
    fn test_parse_completion_separators() {
        let expected = PaymentCompletion {
            order_id: "order_1".to_string(),
            payment_id: "pay_1".to_string(),
            signature: "abc123".to_string(),
        };
        assert_eq!(parse_completion("order_1 pay_1 abc123\n"), Some(expected.clone()));
        assert_eq!(parse_completion("order_1, pay_1, abc123"), Some(expected.clone()));
        assert_eq!(parse_completion("order_1|pay_1|abc123"), Some(expected));
        assert_eq!(parse_completion("order_1 pay_1"), None);
    }

    #[tokio::test]
    async fn test_open_completes() {
        let widget = TerminalWidget::new(&b"order_1 pay_1 abc123\n"[..]);
        let outcome = widget.open(&options()).await;
        assert!(matches!(outcome, WidgetOutcome::Completed(c) if c.payment_id == "pay_1"));
    }

    #[tokio::test]
    async fn test_open_retries_malformed_input() {
        let widget = TerminalWidget::new(&b"garbage\norder_1 pay_1 abc123\n"[..]);
        assert!(matches!(
            widget.open(&options()).await,
            WidgetOutcome::Completed(_)
        ));
    }

    #[tokio::test]
    async fn test_empty_line_or_eof_dismisses() {
        let widget = TerminalWidget::new(&b"\n"[..]);
        assert_eq!(widget.open(&options()).await, WidgetOutcome::Dismissed);

        let widget = TerminalWidget::new(&b""[..]);
        assert_eq!(widget.open(&options()).await, WidgetOutcome::Dismissed);
    }
}
