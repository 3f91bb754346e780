use common::Money;
use serde::{Deserialize, Serialize};

use super::delivery::DeliveryIntent;

/// Command to add a product to the current cart.
///
/// Built once per add-to-cart call; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRequest {
    pub marketplace_code: String,
    pub variant_code: Option<String>,
    pub qty: u32,
    pub delivery_intent: DeliveryIntent,
    /// Unit price resolved from the catalog; filled in by the cart service.
    pub unit_price: Option<Money>,
}

impl AddRequest {
    /// Creates a request, clamping a negative quantity to zero.
    pub fn new(marketplace_code: impl Into<String>, qty: i64, delivery_intent: DeliveryIntent) -> Self {
        Self {
            marketplace_code: marketplace_code.into(),
            variant_code: None,
            qty: u32::try_from(qty.max(0)).unwrap_or(u32::MAX),
            delivery_intent,
            unit_price: None,
        }
    }

    /// Sets the variant code; an empty code means no variant.
    pub fn with_variant(mut self, variant_code: impl Into<String>) -> Self {
        let variant_code = variant_code.into();
        self.variant_code = (!variant_code.is_empty()).then_some(variant_code);
        self
    }

    pub fn with_unit_price(mut self, price: Money) -> Self {
        self.unit_price = Some(price);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_qty_is_clamped() {
        let request = AddRequest::new("SKU-001", -3, DeliveryIntent::delivery());
        assert_eq!(request.qty, 0);
    }

    #[test]
    fn test_empty_variant_is_none() {
        let request = AddRequest::new("SKU-001", 1, DeliveryIntent::delivery()).with_variant("");
        assert_eq!(request.variant_code, None);

        let request = request.with_variant("SKU-001-red");
        assert_eq!(request.variant_code.as_deref(), Some("SKU-001-red"));
    }
}
