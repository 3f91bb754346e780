//! Payment gateway trait and its implementations.

pub mod hosted;
pub mod offline;

use async_trait::async_trait;
use cart::{Cart, PaymentRecord, PaymentSelection};
use common::CorrelationId;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PaymentError, Result};

pub use hosted::{HOSTED_GATEWAY_CODE, HostedPageGateway};
pub use offline::{OFFLINE_GATEWAY_CODE, OfflineGateway};

/// A payment method offered by a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    pub title: String,
    pub code: String,
}

impl Method {
    pub fn new(title: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            code: code.into(),
        }
    }
}

/// How a payment flow has to be started.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowResult {
    /// The order may be placed before the customer has paid.
    pub early_place_order: bool,
    /// Page the customer is sent to, if the gateway redirects.
    pub redirect_url: Option<Url>,
}

/// Where to send the customer to run the payment flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRedirect {
    pub url: Url,
}

/// One payment method family.
///
/// All lifecycle steps receive the current cart read-only and verify that it
/// is bound to this gateway before doing anything else.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Code the cart's payment selection refers to.
    fn code(&self) -> &str;

    /// Payment methods offered by this gateway.
    fn methods(&self) -> Vec<Method>;

    fn is_supported_method(&self, method: &str) -> bool {
        self.methods().iter().any(|m| m.code == method)
    }

    /// Checks that the cart is bound to this gateway and only uses methods
    /// it supports.
    fn check_cart<'a>(&self, cart: &'a Cart) -> Result<&'a PaymentSelection> {
        let selection = cart
            .payment_selection()
            .ok_or(PaymentError::NoPaymentSelection)?;

        if selection.gateway() != self.code() {
            return Err(PaymentError::GatewayMismatch {
                expected: self.code().to_string(),
                actual: selection.gateway().to_string(),
            });
        }

        if let Some(qualifier) = selection
            .cart_split()
            .keys()
            .find(|qualifier| !self.is_supported_method(&qualifier.method))
        {
            return Err(PaymentError::UnsupportedMethod {
                gateway: self.code().to_string(),
                method: qualifier.method.clone(),
            });
        }

        Ok(selection)
    }

    /// Describes how the flow will be started.
    async fn get_start_flow_result(
        &self,
        cart: &Cart,
        correlation_id: &CorrelationId,
        return_url: &Url,
    ) -> Result<FlowResult>;

    /// Starts the flow and returns where to send the customer.
    async fn start_flow(
        &self,
        cart: &Cart,
        correlation_id: &CorrelationId,
        return_url: &Url,
    ) -> Result<FlowRedirect>;

    /// Returns the payment record once the flow has a definitive result.
    async fn get_flow_result(
        &self,
        cart: &Cart,
        correlation_id: &CorrelationId,
    ) -> Result<PaymentRecord>;

    /// Finalizes the payment with the provider.
    async fn confirm_result(
        &self,
        cart: &Cart,
        correlation_id: &CorrelationId,
        payment: &PaymentRecord,
    ) -> Result<()>;
}
