//! HTTP client for the storefront API.
//!
//! Implements the checkout collaborators on top of the storefront's payment
//! endpoints, so the CLI never holds the gateway key secret.

use async_trait::async_trait;
use reqwest::StatusCode;
use sakria_core::checkout::{
    GatewayOrder, OrderRequest, OrderService, PaymentCompletion, PaymentDetails, PaymentVerifier,
    Verification,
};
use sakria_core::{CheckoutError, CurrencyCode, ProductId, ProductRef};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid storefront URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },
}

/// Storefront API client.
#[derive(Debug, Clone)]
pub struct StorefrontApi {
    client: reqwest::Client,
    base: Url,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    setup_required: bool,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    order: GatewayOrderBody,
}

#[derive(Debug, Deserialize)]
struct GatewayOrderBody {
    id: String,
    amount: u64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    payment: PaymentBody,
}

#[derive(Debug, Deserialize)]
struct PaymentBody {
    id: String,
    amount: u64,
    #[serde(default)]
    method: Option<String>,
}

/// Payment API status as reported by `GET /api/payment/test`.
#[derive(Debug, Deserialize)]
pub struct PaymentStatus {
    pub message: String,
    pub environment: PaymentEnvironment,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)]
pub struct PaymentEnvironment {
    pub has_key_id: bool,
    pub has_key_secret: bool,
    #[serde(default)]
    pub has_webhook_secret: bool,
}

impl StorefrontApi {
    /// Client for the storefront at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse or the HTTP client fails
    /// to build.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("sakria-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path)?)
    }

    /// Fetch a product from the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the product does not exist.
    #[instrument(skip(self))]
    pub async fn product(&self, id: ProductId) -> Result<ProductRef, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("api/products/{id}"))?)
            .send()
            .await?;
        json_or_error(response).await
    }

    /// Report which payment credentials the storefront has.
    ///
    /// # Errors
    ///
    /// Returns an error if the storefront cannot be reached.
    pub async fn payment_status(&self) -> Result<PaymentStatus, ApiError> {
        let response = self.client.get(self.url("api/payment/test")?).send().await?;
        json_or_error(response).await
    }
}

async fn json_or_error<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Api {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| body.trim().to_string())
}

/// Map a failed order-creation response onto the checkout error taxonomy.
fn order_error(status: StatusCode, body: &str) -> CheckoutError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let setup_required = parsed.as_ref().is_some_and(|b| b.setup_required);
    let message = error_message(body);

    if setup_required {
        CheckoutError::Configuration(message)
    } else if status == StatusCode::BAD_REQUEST {
        CheckoutError::Validation(message)
    } else {
        CheckoutError::Transport(format!("{message} (HTTP {})", status.as_u16()))
    }
}

/// Map a failed verification response: a 400 means the payment itself was
/// rejected; anything else means the check could not be made.
fn verify_error(status: StatusCode, body: &str) -> Result<Verification, CheckoutError> {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let message = error_message(body);

    if parsed.as_ref().is_some_and(|b| b.setup_required) {
        Err(CheckoutError::Configuration(message))
    } else if status == StatusCode::BAD_REQUEST {
        Ok(Verification::Invalid(message))
    } else {
        Err(CheckoutError::Transport(format!(
            "{message} (HTTP {})",
            status.as_u16()
        )))
    }
}

fn transport(e: impl std::fmt::Display) -> CheckoutError {
    CheckoutError::Transport(e.to_string())
}

#[async_trait]
impl OrderService for StorefrontApi {
    #[instrument(skip(self, request), fields(amount = request.amount))]
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, CheckoutError> {
        let url = self.url("api/payment/create-order").map_err(transport)?;
        let body = json!({
            "amount": request.amount,
            "currency": request.currency.code(),
            "receipt": request.receipt,
            "notes": request.notes,
            "prefill": request.prefill,
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(order_error(status, &text));
        }

        let created: CreateOrderResponse = response.json().await.map_err(transport)?;
        let currency = created
            .order
            .currency
            .parse::<CurrencyCode>()
            .map_err(CheckoutError::Transport)?;
        debug!(order_id = %created.order.id, "Order created");

        Ok(GatewayOrder {
            id: created.order.id,
            amount: created.order.amount,
            currency,
        })
    }
}

#[async_trait]
impl PaymentVerifier for StorefrontApi {
    #[instrument(skip(self, completion), fields(order_id = %completion.order_id))]
    async fn verify(&self, completion: &PaymentCompletion) -> Result<Verification, CheckoutError> {
        let url = self.url("api/payment/verify").map_err(transport)?;
        let body = json!({
            "razorpay_order_id": completion.order_id,
            "razorpay_payment_id": completion.payment_id,
            "razorpay_signature": completion.signature,
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return verify_error(status, &text);
        }

        let verified: VerifyResponse = response.json().await.map_err(transport)?;
        Ok(Verification::Valid(PaymentDetails {
            id: verified.payment.id,
            amount: verified.payment.amount,
            method: verified.payment.method.unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_base_path() {
        let api = StorefrontApi::new("http://localhost:3000/shop").unwrap();
        assert_eq!(
            api.url("api/payment/test").unwrap().as_str(),
            "http://localhost:3000/shop/api/payment/test"
        );

        let api = StorefrontApi::new("http://localhost:3000").unwrap();
        assert_eq!(
            api.url("api/products/3").unwrap().as_str(),
            "http://localhost:3000/api/products/3"
        );
    }

    #[test]
    fn test_new_rejects_bad_url() {
        assert!(matches!(
            StorefrontApi::new("not a url"),
            Err(ApiError::Url(_))
        ));
    }

    #[test]
    fn test_order_error_setup_required_is_configuration() {
        let err = order_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"success":false,"error":"Razorpay credentials not configured.","setup_required":true}"#,
        );
        assert_eq!(
            err,
            CheckoutError::Configuration("Razorpay credentials not configured.".to_string())
        );
    }

    #[test]
    fn test_order_error_bad_request_is_validation() {
        let err = order_error(
            StatusCode::BAD_REQUEST,
            r#"{"success":false,"error":"Amount is required"}"#,
        );
        assert_eq!(err.to_string(), "invalid order: Amount is required");
    }

    #[test]
    fn test_order_error_gateway_failure_is_transport() {
        let err = order_error(StatusCode::BAD_GATEWAY, "upstream went away");
        assert_eq!(
            err,
            CheckoutError::Transport("upstream went away (HTTP 502)".to_string())
        );
    }

    #[test]
    fn test_verify_error_mapping() {
        assert_eq!(
            verify_error(
                StatusCode::BAD_REQUEST,
                r#"{"success":false,"error":"Invalid payment signature"}"#
            ),
            Ok(Verification::Invalid("Invalid payment signature".to_string()))
        );
        assert!(matches!(
            verify_error(StatusCode::SERVICE_UNAVAILABLE, ""),
            Err(CheckoutError::Transport(_))
        ));
        assert!(matches!(
            verify_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"error":"not configured","setup_required":true}"#
            ),
            Err(CheckoutError::Configuration(_))
        ));
    }
}
