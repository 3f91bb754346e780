//! Application-level error type.

use cart::{CartError, ErrorClass};
use payment::PaymentError;
use thiserror::Error;

/// Errors surfaced by the application wiring and the demo checkout.
#[derive(Debug, Error)]
pub enum AppError {
    /// A configured URL could not be parsed.
    #[error("Invalid URL in configuration: {0}")]
    Config(#[from] url::ParseError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl AppError {
    /// Broad class of the failure, if it came from the engine.
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            AppError::Config(_) => None,
            AppError::Cart(e) => Some(e.class()),
            AppError::Payment(e) => Some(e.class()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_keep_their_class() {
        let err: AppError = PaymentError::NoPaymentSelection.into();
        assert_eq!(err.class(), Some(ErrorClass::InvalidRequest));

        let err: AppError = url::Url::parse("nope").unwrap_err().into();
        assert_eq!(err.class(), None);
    }
}
