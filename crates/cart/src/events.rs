//! Cart domain events and the publisher they are sent to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, ItemId, OrderNumber};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::CartContext;
use crate::model::{AddRequest, CartItem};

/// Events emitted by the cart service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    /// The quantity of an item changed; removal reports a quantity of zero.
    ChangedQtyInCart(ChangedQtyInCartData),

    /// A product was added to the cart.
    AddedToCart(AddedToCartData),

    /// The cart was turned into an order.
    OrderPlaced(OrderPlacedData),
}

impl CartEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            CartEvent::ChangedQtyInCart(_) => "ChangedQtyInCart",
            CartEvent::AddedToCart(_) => "AddedToCart",
            CartEvent::OrderPlaced(_) => "OrderPlaced",
        }
    }

    pub fn changed_qty_in_cart(
        cart_id: CartId,
        item: &CartItem,
        qty_before: u32,
        qty_after: u32,
    ) -> Self {
        CartEvent::ChangedQtyInCart(ChangedQtyInCartData {
            cart_id,
            item_id: item.id.clone(),
            marketplace_code: item.marketplace_code.clone(),
            variant_code: item.variant_code.clone(),
            qty_before,
            qty_after,
            occurred_at: Utc::now(),
        })
    }

    pub fn added_to_cart(request: &AddRequest) -> Self {
        CartEvent::AddedToCart(AddedToCartData {
            marketplace_code: request.marketplace_code.clone(),
            variant_code: request.variant_code.clone(),
            qty: request.qty,
            occurred_at: Utc::now(),
        })
    }

    pub fn order_placed(cart_id: CartId, order_number: OrderNumber) -> Self {
        CartEvent::OrderPlaced(OrderPlacedData {
            cart_id,
            order_number,
            occurred_at: Utc::now(),
        })
    }
}

/// Data for ChangedQtyInCart event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedQtyInCartData {
    pub cart_id: CartId,
    pub item_id: ItemId,
    pub marketplace_code: String,
    pub variant_code: Option<String>,
    pub qty_before: u32,
    pub qty_after: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Data for AddedToCart event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedToCartData {
    pub marketplace_code: String,
    pub variant_code: Option<String>,
    pub qty: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Data for OrderPlaced event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub cart_id: CartId,
    pub order_number: OrderNumber,
    pub occurred_at: DateTime<Utc>,
}

/// Errors returned by an event sink.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Event sink unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Sink for cart events.
///
/// Publication is best effort: the cart service logs a failed publish and
/// carries on.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, ctx: &CartContext, event: CartEvent) -> Result<(), PublishError>;
}

#[cfg(test)]
mod tests {
    use common::Money;

    use super::*;
    use crate::model::DeliveryIntent;

    #[test]
    fn test_event_types() {
        let item = CartItem::new("item-1", "SKU-001", 2, Money::from_cents(100));
        let event = CartEvent::changed_qty_in_cart(CartId::new(), &item, 2, 0);
        assert_eq!(event.event_type(), "ChangedQtyInCart");

        let request = AddRequest::new("SKU-001", 1, DeliveryIntent::delivery());
        assert_eq!(CartEvent::added_to_cart(&request).event_type(), "AddedToCart");

        let event = CartEvent::order_placed(CartId::new(), OrderNumber::new("ORDER-1"));
        assert_eq!(event.event_type(), "OrderPlaced");
    }

    #[test]
    fn test_changed_qty_carries_item_data() {
        let cart_id = CartId::new();
        let item = CartItem::new("item-1", "SKU-001", 2, Money::from_cents(100)).with_variant("v1");

        let CartEvent::ChangedQtyInCart(data) = CartEvent::changed_qty_in_cart(cart_id, &item, 2, 5)
        else {
            panic!("expected ChangedQtyInCart");
        };
        assert_eq!(data.cart_id, cart_id);
        assert_eq!(data.item_id, ItemId::new("item-1"));
        assert_eq!(data.variant_code.as_deref(), Some("v1"));
        assert_eq!((data.qty_before, data.qty_after), (2, 5));
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = CartEvent::order_placed(CartId::new(), OrderNumber::new("ORDER-1"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "OrderPlaced");
        assert_eq!(json["data"]["order_number"], "ORDER-1");
    }
}
