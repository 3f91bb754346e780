//! The cart aggregate.

use common::{CartId, ItemId, Money};
use serde::{Deserialize, Serialize};

use super::delivery::DeliveryIntent;
use super::payment::PaymentSelection;

/// An item in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Identifier, unique within the cart.
    pub id: ItemId,

    /// Marketplace code of the product.
    pub marketplace_code: String,

    /// Marketplace code of the chosen variant, for configurable products.
    pub variant_code: Option<String>,

    pub qty: u32,

    /// Price per unit in cents.
    pub unit_price: Money,

    pub delivery_intent: DeliveryIntent,
}

impl CartItem {
    /// Creates a new cart item with an unspecified delivery intent.
    pub fn new(
        id: impl Into<ItemId>,
        marketplace_code: impl Into<String>,
        qty: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            id: id.into(),
            marketplace_code: marketplace_code.into(),
            variant_code: None,
            qty,
            unit_price,
            delivery_intent: DeliveryIntent::unspecified(),
        }
    }

    pub fn with_variant(mut self, variant_code: impl Into<String>) -> Self {
        self.variant_code = Some(variant_code.into());
        self
    }

    pub fn with_delivery_intent(mut self, intent: DeliveryIntent) -> Self {
        self.delivery_intent = intent;
        self
    }

    /// Returns the total price for this item (qty * unit_price).
    pub fn row_total(&self) -> Money {
        self.unit_price.multiply(self.qty)
    }
}

/// Changes to apply to an existing cart item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemUpdateCommand {
    pub qty: Option<u32>,
}

impl ItemUpdateCommand {
    pub fn qty(qty: u32) -> Self {
        Self { qty: Some(qty) }
    }
}

/// A shopping cart.
///
/// Carts are loaded and persisted by a [`crate::CartStore`]. The mutating
/// methods below are meant for store implementations; the cart service only
/// ever reads a cart and sends commands to the store's behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    id: CartId,
    items: Vec<CartItem>,
    payment_selection: Option<PaymentSelection>,
    /// Incremented by the store on every committed mutation.
    version: u64,
}

impl Cart {
    /// Creates an empty cart.
    pub fn new(id: CartId) -> Self {
        Self {
            id,
            items: Vec::new(),
            payment_selection: None,
            version: 0,
        }
    }

    pub fn with_item(mut self, item: CartItem) -> Self {
        self.insert_item(item);
        self
    }

    pub fn with_payment_selection(mut self, selection: PaymentSelection) -> Self {
        self.payment_selection = Some(selection);
        self
    }

    pub fn id(&self) -> CartId {
        self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn items(&self) -> impl Iterator<Item = &CartItem> {
        self.items.iter()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Looks up an item by its ID.
    pub fn item(&self, item_id: &ItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == item_id)
    }

    /// Finds an item for the same product, variant and delivery intent.
    pub fn matching_item(
        &self,
        marketplace_code: &str,
        variant_code: Option<&str>,
        intent: &DeliveryIntent,
    ) -> Option<&CartItem> {
        self.items.iter().find(|item| {
            item.marketplace_code == marketplace_code
                && item.variant_code.as_deref() == variant_code
                && &item.delivery_intent == intent
        })
    }

    pub fn payment_selection(&self) -> Option<&PaymentSelection> {
        self.payment_selection.as_ref()
    }

    /// Total payable amount: the sum of all row totals.
    pub fn grand_total(&self) -> Money {
        self.items.iter().map(CartItem::row_total).sum()
    }

    /// Inserts an item, replacing any item with the same ID.
    pub fn insert_item(&mut self, item: CartItem) {
        match self.items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    /// Removes an item, returning it if it was present.
    pub fn remove_item(&mut self, item_id: &ItemId) -> Option<CartItem> {
        let position = self.items.iter().position(|item| &item.id == item_id)?;
        Some(self.items.remove(position))
    }

    /// Sets the quantity of an item. Returns false if the item is absent.
    pub fn set_item_qty(&mut self, item_id: &ItemId, qty: u32) -> bool {
        match self.items.iter_mut().find(|item| &item.id == item_id) {
            Some(item) => {
                item.qty = qty;
                true
            }
            None => false,
        }
    }

    pub fn set_payment_selection(&mut self, selection: Option<PaymentSelection>) {
        self.payment_selection = selection;
    }

    /// Marks a committed mutation.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cart() -> Cart {
        Cart::new(CartId::new())
            .with_item(CartItem::new("item-1", "SKU-001", 2, Money::from_cents(1000)))
            .with_item(CartItem::new("item-2", "SKU-002", 1, Money::from_cents(2500)))
    }

    #[test]
    fn test_grand_total() {
        assert_eq!(sample_cart().grand_total(), Money::from_cents(4500));
    }

    #[test]
    fn test_insert_item_keeps_ids_unique() {
        let mut cart = sample_cart();
        cart.insert_item(CartItem::new("item-1", "SKU-001", 5, Money::from_cents(1000)));

        assert_eq!(cart.item_count(), 2);
        assert_eq!(cart.item(&ItemId::new("item-1")).map(|i| i.qty), Some(5));
    }

    #[test]
    fn test_remove_item() {
        let mut cart = sample_cart();
        let removed = cart.remove_item(&ItemId::new("item-2"));

        assert_eq!(removed.map(|i| i.marketplace_code), Some("SKU-002".to_string()));
        assert_eq!(cart.item_count(), 1);
        assert!(cart.remove_item(&ItemId::new("item-2")).is_none());
    }

    #[test]
    fn test_set_item_qty_on_missing_item() {
        let mut cart = sample_cart();
        assert!(!cart.set_item_qty(&ItemId::new("missing"), 3));
        assert!(cart.set_item_qty(&ItemId::new("item-2"), 3));
        assert_eq!(cart.grand_total(), Money::from_cents(9500));
    }

    #[test]
    fn test_matching_item_respects_delivery_intent() {
        let cart = Cart::new(CartId::new()).with_item(
            CartItem::new("item-1", "SKU-001", 1, Money::from_cents(100))
                .with_delivery_intent(DeliveryIntent::delivery()),
        );

        assert!(cart
            .matching_item("SKU-001", None, &DeliveryIntent::delivery())
            .is_some());
        assert!(cart
            .matching_item("SKU-001", None, &DeliveryIntent::pickup_autodetect())
            .is_none());
    }

    #[test]
    fn test_cart_serialization() {
        let cart = sample_cart();
        let json = serde_json::to_string(&cart).unwrap();
        let deserialized: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(cart, deserialized);
    }
}
