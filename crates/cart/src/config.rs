//! Cart configuration loaded from environment variables.

use crate::model::DeliveryMethod;

/// Cart service configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `CART_DEFAULT_DELIVERY_INTENT`: intent used when a caller supplies none (default: `"delivery"`)
/// - `CART_VALIDATION_DEFAULT_DELIVERY_METHOD`: delivery method passed to the cart validator (default: `"delivery"`)
#[derive(Debug, Clone)]
pub struct CartConfig {
    pub default_delivery_intent: String,
    pub default_delivery_method_for_validation: DeliveryMethod,
}

impl CartConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_delivery_intent: std::env::var("CART_DEFAULT_DELIVERY_INTENT")
                .ok()
                .filter(|intent| !intent.is_empty())
                .unwrap_or(defaults.default_delivery_intent),
            default_delivery_method_for_validation: std::env::var(
                "CART_VALIDATION_DEFAULT_DELIVERY_METHOD",
            )
            .ok()
            .and_then(|m| m.parse().ok())
            .unwrap_or(defaults.default_delivery_method_for_validation),
        }
    }
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            default_delivery_intent: "delivery".to_string(),
            default_delivery_method_for_validation: DeliveryMethod::Delivery,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = CartConfig::default();
        assert_eq!(config.default_delivery_intent, "delivery");
        assert_eq!(
            config.default_delivery_method_for_validation,
            DeliveryMethod::Delivery
        );
    }
}
