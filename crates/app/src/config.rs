//! Application configuration loaded from environment variables.

use cart::CartConfig;
use payment::CheckoutConfig;

/// Application configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `CHECKOUT_DEMO_SESSION`: guest session the demo checkout runs under (default: `"demo-session"`)
///
/// Cart and checkout settings are read by [`CartConfig::from_env`] and
/// [`CheckoutConfig::from_env`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub demo_session: String,
    pub cart: CartConfig,
    pub checkout: CheckoutConfig,
}

impl AppConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            demo_session: std::env::var("CHECKOUT_DEMO_SESSION")
                .unwrap_or_else(|_| "demo-session".to_string()),
            cart: CartConfig::from_env(),
            checkout: CheckoutConfig::from_env(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            demo_session: "demo-session".to_string(),
            cart: CartConfig::default(),
            checkout: CheckoutConfig::default(),
        }
    }
}
