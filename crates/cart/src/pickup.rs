//! Pickup location detection.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::CartContext;
use crate::error::UpstreamError;
use crate::model::{AddRequest, DeliveryLocationType};
use crate::product::Product;

/// A pickup location picked for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedLocation {
    pub code: String,
    pub location_type: DeliveryLocationType,
}

impl DetectedLocation {
    pub fn new(location_type: DeliveryLocationType, code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            location_type,
        }
    }
}

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("No pickup location available for {0}")]
    NoLocation(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Infers a pickup location when a pickup request does not name one.
#[async_trait]
pub trait PickupLocationDetector: Send + Sync {
    async fn detect(
        &self,
        ctx: &CartContext,
        product: &Product,
        request: &AddRequest,
    ) -> Result<DetectedLocation, DetectionError>;
}

/// Detector backed by a fixed product-to-location table.
#[derive(Debug, Clone, Default)]
pub struct StaticPickupLocationDetector {
    locations: HashMap<String, DetectedLocation>,
    fallback: Option<DetectedLocation>,
}

impl StaticPickupLocationDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a location to a product marketplace code.
    pub fn with_location(mut self, marketplace_code: impl Into<String>, location: DetectedLocation) -> Self {
        self.locations.insert(marketplace_code.into(), location);
        self
    }

    /// Location used for products without an entry.
    pub fn with_fallback(mut self, location: DetectedLocation) -> Self {
        self.fallback = Some(location);
        self
    }
}

#[async_trait]
impl PickupLocationDetector for StaticPickupLocationDetector {
    async fn detect(
        &self,
        _ctx: &CartContext,
        product: &Product,
        _request: &AddRequest,
    ) -> Result<DetectedLocation, DetectionError> {
        self.locations
            .get(product.marketplace_code())
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| DetectionError::NoLocation(product.marketplace_code().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use common::Money;

    use super::*;
    use crate::model::DeliveryIntent;

    #[tokio::test]
    async fn test_static_detector_prefers_product_entry() {
        let detector = StaticPickupLocationDetector::new()
            .with_location("mug", DetectedLocation::new(DeliveryLocationType::Store, "store-1"))
            .with_fallback(DetectedLocation::new(DeliveryLocationType::CollectionPoint, "cp-1"));
        let ctx = CartContext::guest("s1");
        let request = AddRequest::new("mug", 1, DeliveryIntent::pickup_autodetect());

        let mug = Product::simple("mug", "Mug", Money::from_cents(899));
        let location = detector.detect(&ctx, &mug, &request).await.unwrap();
        assert_eq!(location.code, "store-1");

        let plate = Product::simple("plate", "Plate", Money::from_cents(499));
        let location = detector.detect(&ctx, &plate, &request).await.unwrap();
        assert_eq!(location.location_type, DeliveryLocationType::CollectionPoint);
    }

    #[tokio::test]
    async fn test_static_detector_without_fallback_fails() {
        let detector = StaticPickupLocationDetector::new();
        let ctx = CartContext::guest("s1");
        let request = AddRequest::new("mug", 1, DeliveryIntent::pickup_autodetect());
        let mug = Product::simple("mug", "Mug", Money::from_cents(899));

        let result = detector.detect(&ctx, &mug, &request).await;
        assert!(matches!(result, Err(DetectionError::NoLocation(code)) if code == "mug"));
    }
}
