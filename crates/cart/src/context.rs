//! Request-scoped context passed into every cart and payment operation.

use std::future::Future;

use common::CartId;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Who the current cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CartIdentity {
    /// An anonymous visitor, identified by their session.
    Guest { session_id: String },
    /// A signed-in customer.
    Customer { customer_id: String },
}

/// Returned when the context's cancellation token fired before the
/// awaited call finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Context of one incoming request.
///
/// Carries the identity used by the cart store to locate the cart and the
/// cancellation token every external call is raced against.
#[derive(Debug, Clone)]
pub struct CartContext {
    identity: CartIdentity,
    cancellation: CancellationToken,
}

impl CartContext {
    /// Creates a context for a guest session.
    pub fn guest(session_id: impl Into<String>) -> Self {
        Self::new(CartIdentity::Guest {
            session_id: session_id.into(),
        })
    }

    /// Creates a context for a signed-in customer.
    pub fn customer(customer_id: impl Into<String>) -> Self {
        Self::new(CartIdentity::Customer {
            customer_id: customer_id.into(),
        })
    }

    pub fn new(identity: CartIdentity) -> Self {
        Self {
            identity,
            cancellation: CancellationToken::new(),
        }
    }

    /// Replaces the cancellation token, typically with a child of the
    /// server's shutdown token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn identity(&self) -> &CartIdentity {
        &self.identity
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Awaits `fut` unless the context is cancelled first.
    ///
    /// On cancellation the future is dropped, so a collaborator that has not
    /// yet committed never commits.
    pub async fn run_until_cancelled<F>(&self, fut: F) -> Result<F::Output, Cancelled>
    where
        F: Future,
    {
        if self.cancellation.is_cancelled() {
            return Err(Cancelled);
        }

        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(Cancelled),
            output = fut => Ok(output),
        }
    }
}

/// Session state holding the guest cart reference.
///
/// Passed explicitly into order placement, which clears the reference once
/// the order is placed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestSession {
    guest_cart_id: Option<CartId>,
}

impl GuestSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_guest_cart(cart_id: CartId) -> Self {
        Self {
            guest_cart_id: Some(cart_id),
        }
    }

    pub fn guest_cart_id(&self) -> Option<CartId> {
        self.guest_cart_id
    }

    pub fn set_guest_cart(&mut self, cart_id: CartId) {
        self.guest_cart_id = Some(cart_id);
    }

    /// Drops the guest cart reference.
    pub fn clear_guest_cart(&mut self) {
        self.guest_cart_id = None;
    }
}
