//! Product catalog contract and product types.

use async_trait::async_trait;
use common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::CartContext;
use crate::error::UpstreamError;

/// A sellable variant of a configurable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub marketplace_code: String,
    pub title: String,
    pub price: Money,
}

impl Variant {
    pub fn new(marketplace_code: impl Into<String>, title: impl Into<String>, price: Money) -> Self {
        Self {
            marketplace_code: marketplace_code.into(),
            title: title.into(),
            price,
        }
    }
}

/// A product sold as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleProduct {
    pub marketplace_code: String,
    pub title: String,
    pub price: Money,
}

/// A parent product that can only be bought through one of its variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurableProduct {
    pub marketplace_code: String,
    pub title: String,
    pub variants: Vec<Variant>,
    active_variant: Option<Variant>,
}

impl ConfigurableProduct {
    pub fn new(
        marketplace_code: impl Into<String>,
        title: impl Into<String>,
        variants: Vec<Variant>,
    ) -> Self {
        Self {
            marketplace_code: marketplace_code.into(),
            title: title.into(),
            variants,
            active_variant: None,
        }
    }

    /// Looks up a variant by its marketplace code.
    pub fn variant(&self, marketplace_code: &str) -> Option<&Variant> {
        self.variants
            .iter()
            .find(|variant| variant.marketplace_code == marketplace_code)
    }

    /// Binds the variant chosen for the current operation.
    pub fn with_active_variant(mut self, variant: Variant) -> Self {
        self.active_variant = Some(variant);
        self
    }

    pub fn active_variant(&self) -> Option<&Variant> {
        self.active_variant.as_ref()
    }
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Product {
    Simple(SimpleProduct),
    Configurable(ConfigurableProduct),
}

impl Product {
    pub fn simple(marketplace_code: impl Into<String>, title: impl Into<String>, price: Money) -> Self {
        Product::Simple(SimpleProduct {
            marketplace_code: marketplace_code.into(),
            title: title.into(),
            price,
        })
    }

    pub fn marketplace_code(&self) -> &str {
        match self {
            Product::Simple(p) => &p.marketplace_code,
            Product::Configurable(p) => &p.marketplace_code,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Product::Simple(p) => &p.title,
            Product::Configurable(p) => &p.title,
        }
    }

    /// Unit price: the product's own price, or the active variant's.
    pub fn price(&self) -> Option<Money> {
        match self {
            Product::Simple(p) => Some(p.price),
            Product::Configurable(p) => p.active_variant().map(|variant| variant.price),
        }
    }
}

/// Errors returned by a product catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Product not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Read access to the product catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fetches a product by its marketplace code.
    async fn get(&self, ctx: &CartContext, marketplace_code: &str) -> Result<Product, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shirt() -> ConfigurableProduct {
        ConfigurableProduct::new(
            "shirt",
            "Shirt",
            vec![
                Variant::new("shirt-red", "Red shirt", Money::from_cents(1999)),
                Variant::new("shirt-blue", "Blue shirt", Money::from_cents(2499)),
            ],
        )
    }

    #[test]
    fn test_variant_lookup() {
        let product = shirt();
        assert!(product.variant("shirt-blue").is_some());
        assert!(product.variant("shirt-green").is_none());
    }

    #[test]
    fn test_price_follows_active_variant() {
        let configurable = shirt();
        assert_eq!(Product::Configurable(configurable.clone()).price(), None);

        let variant = configurable.variant("shirt-blue").cloned().unwrap();
        let product = Product::Configurable(configurable.with_active_variant(variant));
        assert_eq!(product.price(), Some(Money::from_cents(2499)));
    }

    #[test]
    fn test_simple_product_accessors() {
        let product = Product::simple("mug", "Mug", Money::from_cents(899));
        assert_eq!(product.marketplace_code(), "mug");
        assert_eq!(product.title(), "Mug");
        assert_eq!(product.price(), Some(Money::from_cents(899)));
    }
}
