//! Checkout configuration loaded from environment variables.

use std::time::Duration;

use url::Url;

/// Checkout configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `CHECKOUT_ENABLE_OFFLINE_PAYMENT`: registers the offline gateway (default: `true`)
/// - `CHECKOUT_HOSTED_PAGE_URL`: base URL of the hosted payment page (default: `"https://pay.example.com/hosted"`)
/// - `CHECKOUT_RETURN_URL`: where customers come back after paying (default: `"https://shop.example.com/checkout/return"`)
/// - `CHECKOUT_FLOW_TTL_SECS`: how long an unconfirmed payment flow is kept (default: `3600`)
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub enable_offline_payment: bool,
    pub hosted_page_url: String,
    pub return_url: String,
    pub flow_ttl_secs: u64,
}

impl CheckoutConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enable_offline_payment: std::env::var("CHECKOUT_ENABLE_OFFLINE_PAYMENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.enable_offline_payment),
            hosted_page_url: std::env::var("CHECKOUT_HOSTED_PAGE_URL")
                .unwrap_or(defaults.hosted_page_url),
            return_url: std::env::var("CHECKOUT_RETURN_URL").unwrap_or(defaults.return_url),
            flow_ttl_secs: std::env::var("CHECKOUT_FLOW_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.flow_ttl_secs),
        }
    }

    pub fn flow_ttl(&self) -> Duration {
        Duration::from_secs(self.flow_ttl_secs)
    }

    /// Parses the hosted payment page URL.
    pub fn hosted_page_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.hosted_page_url)
    }

    /// Parses the return URL.
    pub fn return_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.return_url)
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            enable_offline_payment: true,
            hosted_page_url: "https://pay.example.com/hosted".to_string(),
            return_url: "https://shop.example.com/checkout/return".to_string(),
            flow_ttl_secs: 3600,
        }
    }
}
