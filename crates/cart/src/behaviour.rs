//! Contracts of the cart snapshot store.

use std::sync::Arc;

use async_trait::async_trait;
use common::{ItemId, OrderNumber};

use crate::context::CartContext;
use crate::error::UpstreamError;
use crate::model::{AddRequest, Cart, ItemUpdateCommand, PaymentRecord, PaymentSelection};

/// Loads the current cart for a request.
///
/// The store owns persistence and exclusivity: of two concurrent mutations
/// against the same cart, at most one may be accepted.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns the current cart together with the behaviour that may mutate it.
    async fn get_cart(
        &self,
        ctx: &CartContext,
    ) -> Result<(Cart, Arc<dyn CartBehaviour>), UpstreamError>;
}

/// Performs persisted mutations on a cart.
///
/// Every method receives the cart as it was loaded; implementations reject
/// the command if the stored cart has moved on since.
#[async_trait]
pub trait CartBehaviour: Send + Sync {
    /// Applies an item update and returns the updated cart.
    async fn update_item(
        &self,
        ctx: &CartContext,
        cart: &Cart,
        item_id: &ItemId,
        update: ItemUpdateCommand,
    ) -> Result<Cart, UpstreamError>;

    /// Deletes an item and returns the updated cart.
    async fn delete_item(
        &self,
        ctx: &CartContext,
        cart: &Cart,
        item_id: &ItemId,
    ) -> Result<Cart, UpstreamError>;

    /// Adds a product and returns the updated cart.
    async fn add_to_cart(
        &self,
        ctx: &CartContext,
        cart: &Cart,
        request: &AddRequest,
    ) -> Result<Cart, UpstreamError>;

    /// Binds the cart to a gateway and split, or clears the binding.
    async fn update_payment_selection(
        &self,
        ctx: &CartContext,
        cart: &Cart,
        selection: Option<PaymentSelection>,
    ) -> Result<Cart, UpstreamError>;

    /// Turns the cart into an order.
    async fn place_order(
        &self,
        ctx: &CartContext,
        cart: &Cart,
        payment: &PaymentRecord,
    ) -> Result<OrderNumber, UpstreamError>;
}
