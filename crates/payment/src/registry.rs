//! Gateways available to the checkout, keyed by code.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::CheckoutConfig;
use crate::gateway::{HostedPageGateway, OfflineGateway, PaymentGateway};
use crate::processor::PaymentProcessor;

/// Registry of payment gateways.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: BTreeMap<String, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from configuration.
    ///
    /// The hosted gateway is always registered; the offline gateway only if
    /// enabled.
    pub fn from_config(
        config: &CheckoutConfig,
        processor: Arc<dyn PaymentProcessor>,
    ) -> Result<Self, url::ParseError> {
        let mut registry = Self::new()
            .with_gateway(Arc::new(HostedPageGateway::new(processor, config.hosted_page_url()?)));

        if config.enable_offline_payment {
            registry.register(Arc::new(OfflineGateway::new()));
        } else {
            tracing::info!("offline payment disabled");
        }
        Ok(registry)
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.register(gateway);
        self
    }

    /// Registers a gateway, replacing one with the same code.
    pub fn register(&mut self, gateway: Arc<dyn PaymentGateway>) {
        self.gateways.insert(gateway.code().to_string(), gateway);
    }

    pub fn get(&self, code: &str) -> Option<Arc<dyn PaymentGateway>> {
        self.gateways.get(code).cloned()
    }

    /// Codes of all registered gateways, sorted.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.gateways.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for GatewayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayRegistry")
            .field("gateways", &self.gateways.keys().collect::<Vec<_>>())
            .finish()
    }
}
