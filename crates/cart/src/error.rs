//! Cart error types.

use common::{CartId, ItemId};
use thiserror::Error;

use crate::validation::ValidationError;

/// Coarse classification of a failure, used by callers to tell client
/// mistakes apart from collaborator failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// An item, product or variant does not exist.
    NotFound,
    /// The request itself is malformed or violates a precondition.
    InvalidRequest,
    /// A validator rejected the request.
    ValidationFailed,
    /// A collaborator (store, catalog, gateway, processor) failed.
    Upstream,
    /// The operation was cancelled before it could finish.
    Cancelled,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::NotFound => "not_found",
            ErrorClass::InvalidRequest => "invalid_request",
            ErrorClass::ValidationFailed => "validation_failed",
            ErrorClass::Upstream => "upstream",
            ErrorClass::Cancelled => "cancelled",
        }
    }

    /// Returns true if the failure was caused by the caller's request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorClass::NotFound | ErrorClass::InvalidRequest | ErrorClass::ValidationFailed
        )
    }
}

/// Failures reported by injected collaborators.
///
/// The service never interprets these; they are surfaced as
/// [`CartError::Upstream`] with the name of the failing operation.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Another mutation was committed against the cart first.
    #[error("Concurrency conflict for cart {cart_id}: expected version {expected}, found {actual}")]
    Conflict {
        cart_id: CartId,
        expected: u64,
        actual: u64,
    },

    /// The cart no longer exists in the store.
    #[error("Cart not found: {0}")]
    CartNotFound(CartId),

    /// The collaborator could not be reached.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The collaborator refused the command.
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Errors surfaced by [`crate::CartService`].
#[derive(Debug, Error)]
pub enum CartError {
    /// Item not found in the current cart.
    #[error("Item not found: {item_id}")]
    ItemNotFound { item_id: ItemId },

    /// Product not found in the catalog.
    #[error("Product not found: {marketplace_code}")]
    ProductNotFound { marketplace_code: String },

    /// A configurable product was requested without a variant.
    #[error("No variant given for configurable product {marketplace_code}")]
    VariantRequired { marketplace_code: String },

    /// The requested variant does not exist on the configurable product.
    #[error("Product {marketplace_code} has no variant {variant_code}")]
    VariantNotFound {
        marketplace_code: String,
        variant_code: String,
    },

    /// A validator rejected the request.
    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// A collaborator failed while running the operation.
    #[error("{operation} failed: {source}")]
    Upstream {
        operation: &'static str,
        #[source]
        source: UpstreamError,
    },

    /// The operation was cancelled before it committed.
    #[error("{operation} was cancelled")]
    Cancelled { operation: &'static str },
}

impl CartError {
    /// Returns the class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            CartError::ItemNotFound { .. }
            | CartError::ProductNotFound { .. }
            | CartError::VariantNotFound { .. } => ErrorClass::NotFound,
            CartError::VariantRequired { .. } => ErrorClass::InvalidRequest,
            CartError::ValidationFailed(_) => ErrorClass::ValidationFailed,
            CartError::Upstream { .. } => ErrorClass::Upstream,
            CartError::Cancelled { .. } => ErrorClass::Cancelled,
        }
    }
}

/// Convenience type alias for cart results.
pub type Result<T> = std::result::Result<T, CartError>;
