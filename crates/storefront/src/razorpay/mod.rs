//! Razorpay REST client.
//!
//! Authenticates with HTTP basic auth (key id / key secret). Amounts are
//! always minor units on the wire.

pub mod signature;
pub mod types;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::instrument;

pub use signature::{SignatureError, sign, verify_payment_signature, verify_webhook_signature};
pub use types::{CreateOrderRequest, Order, Payment, Refund, WebhookEvent};

use crate::config::RazorpayConfig;
use types::ApiErrorBody;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when interacting with the Razorpay API.
#[derive(Debug, Error)]
pub enum RazorpayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Key id or key secret is missing.
    #[error(
        "Razorpay credentials not configured. Set RAZORPAY_KEY_ID and RAZORPAY_KEY_SECRET in the environment."
    )]
    NotConfigured,
}

/// Razorpay API client.
#[derive(Clone)]
pub struct RazorpayClient {
    client: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: SecretString,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl RazorpayClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::NotConfigured` if either credential is missing,
    /// or `Http` if the HTTP client fails to build.
    pub fn new(config: &RazorpayConfig) -> Result<Self, RazorpayError> {
        let (key_id, key_secret) = config.credentials().ok_or(RazorpayError::NotConfigured)?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("sakria-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            key_id: key_id.to_string(),
            key_secret: key_secret.clone(),
        })
    }

    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Key secret, used to check checkout signatures.
    #[must_use]
    pub const fn key_secret(&self) -> &SecretString {
        &self.key_secret
    }

    /// Create an order.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, request), fields(amount = request.amount, receipt = %request.receipt))]
    pub async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order, RazorpayError> {
        let response = self
            .client
            .post(format!("{}/v1/orders", self.api_base))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(request)
            .send()
            .await?;

        let order: Order = parse_response(response).await?;
        tracing::info!(order_id = %order.id, "Razorpay order created");
        Ok(order)
    }

    /// Fetch a payment by id.
    ///
    /// # Errors
    ///
    /// Returns error if the id is malformed or the API request fails.
    #[instrument(skip(self))]
    pub async fn fetch_payment(&self, payment_id: &str) -> Result<Payment, RazorpayError> {
        if !is_valid_entity_id(payment_id) {
            return Err(RazorpayError::Parse(format!(
                "invalid payment id: {payment_id}"
            )));
        }

        let response = self
            .client
            .get(format!("{}/v1/payments/{payment_id}", self.api_base))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .send()
            .await?;

        parse_response(response).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, RazorpayError> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| {
                if b.error.description.is_empty() {
                    b.error.code
                } else {
                    b.error.description
                }
            })
            .unwrap_or(body);
        return Err(RazorpayError::Api {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json()
        .await
        .map_err(|e| RazorpayError::Parse(e.to_string()))
}

/// Razorpay ids are `<prefix>_<alphanumeric>`; anything else never reaches a URL.
fn is_valid_entity_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
