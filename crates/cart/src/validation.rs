//! Optional cart and item validators.

use async_trait::async_trait;
use common::ItemId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::CartContext;
use crate::model::{AddRequest, Cart, DeliveryMethod};
use crate::product::Product;

/// How serious a validation finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
    /// The item the finding is about, if it concerns a single item.
    pub item_id: Option<ItemId>,
}

impl Finding {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            item_id: None,
        }
    }

    pub fn for_item(mut self, item_id: ItemId) -> Self {
        self.item_id = Some(item_id);
        self
    }
}

/// Outcome of validating a whole cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    findings: Vec<Finding>,
}

impl ValidationResult {
    /// A result without findings.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn has_findings(&self) -> bool {
        !self.findings.is_empty()
    }

    /// Returns true unless a finding has error severity.
    pub fn is_valid(&self) -> bool {
        self.findings
            .iter()
            .all(|finding| finding.severity < Severity::Error)
    }
}

/// Rejection of an add-to-cart request by an item validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub findings: Vec<Finding>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            findings: Vec::new(),
        }
    }
}

/// Validates the contents of a cart.
#[async_trait]
pub trait CartValidator: Send + Sync {
    async fn validate(
        &self,
        ctx: &CartContext,
        cart: &Cart,
        default_delivery_method: DeliveryMethod,
    ) -> ValidationResult;
}

/// Validates a product before it is added to a cart.
#[async_trait]
pub trait ItemValidator: Send + Sync {
    async fn validate(
        &self,
        ctx: &CartContext,
        request: &AddRequest,
        product: &Product,
    ) -> Result<(), ValidationError>;
}

/// Rejects add requests above a quantity limit, or with nothing to add.
#[derive(Debug, Clone, Copy)]
pub struct MaxQuantityItemValidator {
    max_qty: u32,
}

impl MaxQuantityItemValidator {
    pub fn new(max_qty: u32) -> Self {
        Self { max_qty }
    }
}

#[async_trait]
impl ItemValidator for MaxQuantityItemValidator {
    async fn validate(
        &self,
        _ctx: &CartContext,
        request: &AddRequest,
        product: &Product,
    ) -> Result<(), ValidationError> {
        if request.qty == 0 {
            return Err(ValidationError::new(format!(
                "Quantity for {} must be at least 1",
                product.marketplace_code()
            )));
        }
        if request.qty > self.max_qty {
            return Err(ValidationError::new(format!(
                "Quantity {} for {} exceeds the limit of {}",
                request.qty,
                product.marketplace_code(),
                self.max_qty
            )));
        }
        Ok(())
    }
}

/// Checks that every item can actually be delivered.
///
/// Items without a delivery method are reported as a warning (the default
/// method will be used); pickup items without a location are errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryCartValidator;

#[async_trait]
impl CartValidator for DeliveryCartValidator {
    async fn validate(
        &self,
        _ctx: &CartContext,
        cart: &Cart,
        default_delivery_method: DeliveryMethod,
    ) -> ValidationResult {
        let mut result = ValidationResult::empty();

        for item in cart.items() {
            let method = match item.delivery_intent.method {
                DeliveryMethod::Unspecified => {
                    result.push(
                        Finding::new(
                            Severity::Warning,
                            format!("No delivery method chosen, using {default_delivery_method}"),
                        )
                        .for_item(item.id.clone()),
                    );
                    default_delivery_method
                }
                method => method,
            };

            if method == DeliveryMethod::Pickup && item.delivery_intent.location_code.is_empty() {
                result.push(
                    Finding::new(Severity::Error, "No pickup location for item")
                        .for_item(item.id.clone()),
                );
            }
        }

        result
    }
}
