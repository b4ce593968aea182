//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Errors are rendered as `{"success": false, "error": "..."}`; configuration
//! errors add `"setup_required": true`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::razorpay::RazorpayError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Razorpay API operation failed.
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] RazorpayError),

    /// A payment setting needed by this endpoint is missing.
    #[error("{0}")]
    NotConfigured(String),

    /// A checkout or webhook signature did not verify.
    #[error("{0}")]
    InvalidSignature(String),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    setup_required: bool,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Gateway(RazorpayError::NotConfigured)
            | Self::NotConfigured(_)
            | Self::Session(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidSignature(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    const fn setup_required(&self) -> bool {
        matches!(
            self,
            Self::NotConfigured(_) | Self::Gateway(RazorpayError::NotConfigured)
        )
    }

    /// Message safe to show to clients.
    fn public_message(&self) -> String {
        match self {
            Self::Session(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Gateway(RazorpayError::Api { message, .. }) => message.clone(),
            Self::Gateway(RazorpayError::NotConfigured) => RazorpayError::NotConfigured.to_string(),
            Self::Gateway(_) => "Payment gateway unavailable".to_string(),
            Self::NotConfigured(msg)
            | Self::InvalidSignature(msg)
            | Self::BadRequest(msg)
            | Self::NotFound(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = ErrorBody {
            success: false,
            error: self.public_message(),
            setup_required: self.setup_required(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "3")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product 42".to_string());
        assert_eq!(err.to_string(), "Not found: product 42");

        let err = AppError::BadRequest("Amount is required".to_string());
        assert_eq!(err.to_string(), "Bad request: Amount is required");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::InvalidSignature("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Gateway(RazorpayError::NotConfigured)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Gateway(RazorpayError::Api {
                status: 401,
                message: "Authentication failed".to_string()
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::Internal("lock poisoned at orders.rs".to_string());
        assert_eq!(err.public_message(), "Internal server error");
        assert!(!err.setup_required());
    }

    #[test]
    fn test_not_configured_sets_setup_required() {
        let err = AppError::Gateway(RazorpayError::NotConfigured);
        assert!(err.setup_required());
        assert!(err.public_message().contains("RAZORPAY_KEY_SECRET"));

        let err = AppError::NotConfigured("RAZORPAY_WEBHOOK_SECRET is not set".to_string());
        assert!(err.setup_required());
    }
}
