//! Sakria CLI - local cart and checkout against the storefront API.
//!
//! # Usage
//!
//! ```bash
//! # Browse the cart kept in ./.sakria
//! sakria cart show
//! sakria cart add 3
//! sakria cart update 3 2
//! sakria cart remove 3
//! sakria cart clear
//!
//! # Pay for the cart through the storefront's Razorpay endpoints
//! sakria checkout --name "Asha" --email asha@example.in
//!
//! # Check the storefront's payment setup
//! sakria status
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
// Terminal output is the interface of this binary.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sakria_core::checkout::{DEFAULT_TAX_RATE, Prefill};
use sakria_core::{CartStore, CheckoutConfig, CurrencyCode, ProductId};
use tokio::io::BufReader;

mod api;
mod commands;
mod store;
mod widget;

use api::StorefrontApi;
use store::FileStore;
use widget::TerminalWidget;

#[derive(Parser)]
#[command(name = "sakria")]
#[command(author, version, about = "Sakria Farm and HomeStay store client")]
struct Cli {
    /// Storefront base URL
    #[arg(long, env = "SAKRIA_STOREFRONT_URL", default_value = "http://localhost:3000", global = true)]
    storefront_url: String,

    /// Directory holding the local cart
    #[arg(long, env = "SAKRIA_DATA_DIR", default_value = ".sakria", global = true)]
    data_dir: PathBuf,

    /// Order currency
    #[arg(long, env = "CHECKOUT_CURRENCY", default_value = "INR", global = true)]
    currency: CurrencyCode,

    /// Tax rate as a fraction
    #[arg(long, env = "CHECKOUT_TAX_RATE", default_value_t = DEFAULT_TAX_RATE, global = true)]
    tax_rate: Decimal,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the local cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Pay for the cart
    Checkout {
        /// Public Razorpay key id shown to the checkout widget
        #[arg(long, env = "RAZORPAY_KEY_ID", default_value = "")]
        key_id: String,

        /// Receipt reference (default: order_<unix millis>)
        #[arg(long)]
        receipt: Option<String>,

        /// Customer name
        #[arg(long, default_value = "")]
        name: String,

        /// Customer email
        #[arg(long, default_value = "")]
        email: String,

        /// Customer phone
        #[arg(long, default_value = "")]
        contact: String,
    },
    /// Show the storefront's payment setup
    Status,
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart and its total
    Show,
    /// Add one unit of a product
    Add { id: ProductId },
    /// Remove a product
    Remove { id: ProductId },
    /// Set a product's quantity (0 removes it)
    Update {
        id: ProductId,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Empty the cart
    Clear,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut cart_store = CartStore::new(FileStore::new(&cli.data_dir));
    let api = StorefrontApi::new(&cli.storefront_url)?;

    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&cart_store, cli.currency, cli.tax_rate),
            CartAction::Add { id } => commands::cart::add(&mut cart_store, &api, id).await?,
            CartAction::Remove { id } => commands::cart::remove(&mut cart_store, id),
            CartAction::Update { id, quantity } => {
                commands::cart::update(&mut cart_store, id, quantity);
            }
            CartAction::Clear => commands::cart::clear(&mut cart_store),
        },
        Commands::Checkout {
            key_id,
            receipt,
            name,
            email,
            contact,
        } => {
            let mut config = CheckoutConfig::new(key_id);
            config.currency = cli.currency;
            config.tax_rate = cli.tax_rate;

            let args = commands::checkout::CheckoutArgs {
                receipt,
                prefill: Prefill {
                    name,
                    email,
                    contact,
                },
            };
            let widget = TerminalWidget::new(BufReader::new(tokio::io::stdin()));
            commands::checkout::run(&mut cart_store, api, widget, config, args).await?;
        }
        Commands::Status => commands::status::run(&api).await?,
    }
    Ok(())
}
