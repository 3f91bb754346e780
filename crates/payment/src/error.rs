//! Payment error types.

use cart::{CartError, ErrorClass};
use common::{CorrelationId, Money};
use thiserror::Error;

use crate::processor::ProcessorError;
use crate::state::FlowState;

/// Errors that can occur while driving a payment flow.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The cart is bound to a different gateway.
    #[error("Cart is not supposed to be paid by gateway {expected} (bound to {actual})")]
    GatewayMismatch { expected: String, actual: String },

    /// A payment method in the split is not offered by the gateway.
    #[error("Payment method {method} is not supported by gateway {gateway}")]
    UnsupportedMethod { gateway: String, method: String },

    /// The cart has no payment selection.
    #[error("Cart has no payment selection")]
    NoPaymentSelection,

    /// No gateway is registered under the selected code.
    #[error("No payment gateway registered for code {0}")]
    UnknownGateway(String),

    /// The split does not add up to the cart total.
    #[error("Payment split totals {split_total}, cart totals {cart_total}")]
    SplitTotalMismatch { split_total: Money, cart_total: Money },

    /// The flow is in the wrong state for the requested step.
    #[error("Cannot {step} a payment flow in state {state}")]
    InvalidTransition {
        step: &'static str,
        state: FlowState,
    },

    /// No flow was started for the correlation ID.
    #[error("No payment flow for correlation ID {0}")]
    UnknownFlow(CorrelationId),

    /// The provider has not settled every charge yet.
    #[error("Payment result for {0} is still pending")]
    ResultPending(CorrelationId),

    /// At least one transaction failed or was cancelled.
    #[error("Payment for {0} was declined")]
    Declined(CorrelationId),

    /// The payment result no longer matches the cart's payment split.
    #[error("Payment for {0} no longer matches the cart's payment split")]
    SplitChanged(CorrelationId),

    /// Payment processor error.
    #[error("Payment processor error: {0}")]
    Processor(#[from] ProcessorError),

    /// The provider rejected the confirmation.
    #[error("Payment confirmation failed: {0}")]
    ConfirmationFailed(String),

    /// Cart error.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The step was cancelled before it finished.
    #[error("{operation} was cancelled")]
    Cancelled { operation: &'static str },
}

impl PaymentError {
    /// Returns the class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            PaymentError::GatewayMismatch { .. }
            | PaymentError::UnsupportedMethod { .. }
            | PaymentError::NoPaymentSelection
            | PaymentError::UnknownGateway(_)
            | PaymentError::SplitTotalMismatch { .. }
            | PaymentError::InvalidTransition { .. }
            | PaymentError::ResultPending(_)
            | PaymentError::Declined(_)
            | PaymentError::SplitChanged(_) => ErrorClass::InvalidRequest,
            PaymentError::UnknownFlow(_) => ErrorClass::NotFound,
            PaymentError::Processor(_) | PaymentError::ConfirmationFailed(_) => {
                ErrorClass::Upstream
            }
            PaymentError::Cart(e) => e.class(),
            PaymentError::Cancelled { .. } => ErrorClass::Cancelled,
        }
    }
}

/// Convenience type alias for payment results.
pub type Result<T> = std::result::Result<T, PaymentError>;

#[cfg(test)]
mod tests {
    use common::ItemId;

    use super::*;

    #[test]
    fn test_binding_errors_are_client_errors() {
        let err = PaymentError::GatewayMismatch {
            expected: "offline".to_string(),
            actual: "hosted".to_string(),
        };
        assert!(err.class().is_client_error());
        assert!(PaymentError::NoPaymentSelection.class().is_client_error());
    }

    #[test]
    fn test_cart_errors_keep_their_class() {
        let err = PaymentError::from(CartError::ItemNotFound {
            item_id: ItemId::new("item-1"),
        });
        assert_eq!(err.class(), ErrorClass::NotFound);
    }

    #[test]
    fn test_split_mismatch_message() {
        let err = PaymentError::SplitTotalMismatch {
            split_total: Money::from_cents(3000),
            cart_total: Money::from_cents(4000),
        };
        assert_eq!(err.to_string(), "Payment split totals 30.00, cart totals 40.00");
    }

    #[test]
    fn test_changed_split_is_client_error() {
        let err = PaymentError::SplitChanged(CorrelationId::new("c1"));
        assert_eq!(err.class(), ErrorClass::InvalidRequest);
        assert_eq!(
            err.to_string(),
            "Payment for c1 no longer matches the cart's payment split"
        );
    }

    #[test]
    fn test_processor_errors_are_upstream() {
        let err = PaymentError::from(ProcessorError::Unavailable("timeout".to_string()));
        assert_eq!(err.class(), ErrorClass::Upstream);
    }
}
