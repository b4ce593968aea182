//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::catalog::Catalog;
use crate::config::StorefrontConfig;
use crate::orders::OrderLedger;
use crate::razorpay::{RazorpayClient, RazorpayError};

/// How long a processed webhook event id is remembered. Razorpay retries
/// failed deliveries for up to 24 hours.
const WEBHOOK_DEDUP_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const WEBHOOK_DEDUP_CAPACITY: u64 = 10_000;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    razorpay: Option<RazorpayClient>,
    catalog: Catalog,
    orders: OrderLedger,
    webhook_events: Cache<String, ()>,
}

impl AppState {
    /// Create a new application state with the farm catalog.
    ///
    /// Missing Razorpay credentials are not an error: the payment endpoints
    /// report them per request.
    ///
    /// # Errors
    ///
    /// Returns an error if the Razorpay HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, RazorpayError> {
        Self::with_catalog(config, Catalog::farm())
    }

    /// Create a new application state with a custom catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the Razorpay HTTP client cannot be built.
    pub fn with_catalog(config: StorefrontConfig, catalog: Catalog) -> Result<Self, RazorpayError> {
        let razorpay = match RazorpayClient::new(&config.razorpay) {
            Ok(client) => Some(client),
            Err(RazorpayError::NotConfigured) => {
                tracing::warn!("Razorpay credentials not set, payment endpoints are disabled");
                None
            }
            Err(e) => return Err(e),
        };

        let webhook_events = Cache::builder()
            .max_capacity(WEBHOOK_DEDUP_CAPACITY)
            .time_to_live(WEBHOOK_DEDUP_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                razorpay,
                catalog,
                orders: OrderLedger::new(),
                webhook_events,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the Razorpay client.
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::NotConfigured` if credentials were not set.
    pub fn razorpay(&self) -> Result<&RazorpayClient, RazorpayError> {
        self.inner
            .razorpay
            .as_ref()
            .ok_or(RazorpayError::NotConfigured)
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    #[must_use]
    pub fn orders(&self) -> &OrderLedger {
        &self.inner.orders
    }

    /// Remember a webhook event id. Returns `false` if it was already seen.
    pub async fn mark_webhook_event(&self, event_id: &str) -> bool {
        let entry = self
            .inner
            .webhook_events
            .entry(event_id.to_string())
            .or_insert(())
            .await;
        entry.is_fresh()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_without_credentials() {
        let state = AppState::new(StorefrontConfig::default()).unwrap();
        assert!(matches!(
            state.razorpay(),
            Err(RazorpayError::NotConfigured)
        ));
        assert!(state.orders().is_empty().await);
    }

    #[tokio::test]
    async fn test_mark_webhook_event_once() {
        let state = AppState::new(StorefrontConfig::default()).unwrap();
        assert!(state.mark_webhook_event("evt_1").await);
        assert!(!state.mark_webhook_event("evt_1").await);
        assert!(state.mark_webhook_event("evt_2").await);
    }
}
