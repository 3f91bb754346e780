//! In-memory collaborators for tests and local wiring.
//!
//! These provide the same contracts as production stores, catalogs and
//! event sinks, including optimistic concurrency on cart mutations.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{CartId, ItemId, OrderNumber};
use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::behaviour::{CartBehaviour, CartStore};
use crate::context::{CartContext, CartIdentity};
use crate::error::UpstreamError;
use crate::events::{CartEvent, EventPublisher, PublishError};
use crate::model::{
    AddRequest, Cart, CartItem, ItemUpdateCommand, PaymentRecord, PaymentSelection,
};
use crate::product::{CatalogError, Product, ProductCatalog};

/// Store operations that can be made to fail in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Load,
    UpdateItem,
    DeleteItem,
    AddToCart,
    UpdatePaymentSelection,
    PlaceOrder,
}

impl StoreOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOperation::Load => "load",
            StoreOperation::UpdateItem => "update_item",
            StoreOperation::DeleteItem => "delete_item",
            StoreOperation::AddToCart => "add_to_cart",
            StoreOperation::UpdatePaymentSelection => "update_payment_selection",
            StoreOperation::PlaceOrder => "place_order",
        }
    }
}

/// An order placed through the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOrder {
    pub order_number: OrderNumber,
    pub cart: Cart,
    pub payment: PaymentRecord,
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashMap<CartId, Cart>,
    owners: HashMap<CartIdentity, CartId>,
    orders: Vec<StoredOrder>,
    next_item: u32,
    next_order: u32,
    mutations: usize,
    failing: HashSet<StoreOperation>,
    commit_delay: Option<Duration>,
}

/// In-memory cart store; also serves as the behaviour of the carts it hands out.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartStore {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartStore {
    /// Creates a new empty in-memory cart store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a cart and makes it the current cart of `identity`.
    pub async fn seed(&self, identity: CartIdentity, cart: Cart) {
        let mut state = self.state.write().await;
        state.owners.insert(identity, cart.id());
        state.carts.insert(cart.id(), cart);
    }

    /// Makes the given operation fail until reset.
    pub async fn set_failing(&self, operation: StoreOperation, fail: bool) {
        let mut state = self.state.write().await;
        if fail {
            state.failing.insert(operation);
        } else {
            state.failing.remove(&operation);
        }
    }

    /// Delays every commit, leaving room to cancel it.
    pub async fn set_commit_delay(&self, delay: Option<Duration>) {
        self.state.write().await.commit_delay = delay;
    }

    /// Returns the current cart of `identity`, if any.
    pub async fn cart_for(&self, identity: &CartIdentity) -> Option<Cart> {
        let state = self.state.read().await;
        state
            .owners
            .get(identity)
            .and_then(|id| state.carts.get(id))
            .cloned()
    }

    /// Returns the number of committed mutations.
    pub async fn mutation_count(&self) -> usize {
        self.state.read().await.mutations
    }

    /// Returns all orders placed so far.
    pub async fn orders(&self) -> Vec<StoredOrder> {
        self.state.read().await.orders.clone()
    }

    async fn begin(
        &self,
        operation: StoreOperation,
    ) -> Result<RwLockWriteGuard<'_, InMemoryCartState>, UpstreamError> {
        let delay = self.state.read().await.commit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.write().await;
        if state.failing.contains(&operation) {
            return Err(UpstreamError::Rejected(format!(
                "{} rejected by store",
                operation.as_str()
            )));
        }
        Ok(state)
    }
}

fn check_version(state: &InMemoryCartState, cart: &Cart) -> Result<(), UpstreamError> {
    let stored = state
        .carts
        .get(&cart.id())
        .ok_or(UpstreamError::CartNotFound(cart.id()))?;

    if stored.version() != cart.version() {
        return Err(UpstreamError::Conflict {
            cart_id: cart.id(),
            expected: cart.version(),
            actual: stored.version(),
        });
    }
    Ok(())
}

fn stored_cart<'a>(
    state: &'a mut InMemoryCartState,
    cart: &Cart,
) -> Result<&'a mut Cart, UpstreamError> {
    check_version(state, cart)?;
    state
        .carts
        .get_mut(&cart.id())
        .ok_or(UpstreamError::CartNotFound(cart.id()))
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn get_cart(
        &self,
        ctx: &CartContext,
    ) -> Result<(Cart, Arc<dyn CartBehaviour>), UpstreamError> {
        let mut state = self.state.write().await;
        if state.failing.contains(&StoreOperation::Load) {
            return Err(UpstreamError::Unavailable("cart store offline".to_string()));
        }

        let existing = state
            .owners
            .get(ctx.identity())
            .copied()
            .filter(|id| state.carts.contains_key(id));

        let cart_id = match existing {
            Some(id) => id,
            None => {
                let cart = Cart::new(CartId::new());
                let id = cart.id();
                state.carts.insert(id, cart);
                state.owners.insert(ctx.identity().clone(), id);
                tracing::debug!(cart_id = %id, "created cart for new session");
                id
            }
        };

        let cart = state
            .carts
            .get(&cart_id)
            .cloned()
            .ok_or(UpstreamError::CartNotFound(cart_id))?;

        Ok((cart, Arc::new(self.clone())))
    }
}

#[async_trait]
impl CartBehaviour for InMemoryCartStore {
    async fn update_item(
        &self,
        _ctx: &CartContext,
        cart: &Cart,
        item_id: &ItemId,
        update: ItemUpdateCommand,
    ) -> Result<Cart, UpstreamError> {
        let mut state = self.begin(StoreOperation::UpdateItem).await?;
        let stored = stored_cart(&mut state, cart)?;

        if let Some(qty) = update.qty
            && !stored.set_item_qty(item_id, qty)
        {
            return Err(UpstreamError::Rejected(format!(
                "item {item_id} is not in cart {}",
                cart.id()
            )));
        }

        stored.bump_version();
        let updated = stored.clone();
        state.mutations += 1;
        Ok(updated)
    }

    async fn delete_item(
        &self,
        _ctx: &CartContext,
        cart: &Cart,
        item_id: &ItemId,
    ) -> Result<Cart, UpstreamError> {
        let mut state = self.begin(StoreOperation::DeleteItem).await?;
        let stored = stored_cart(&mut state, cart)?;

        if stored.remove_item(item_id).is_none() {
            return Err(UpstreamError::Rejected(format!(
                "item {item_id} is not in cart {}",
                cart.id()
            )));
        }

        stored.bump_version();
        let updated = stored.clone();
        state.mutations += 1;
        Ok(updated)
    }

    async fn add_to_cart(
        &self,
        _ctx: &CartContext,
        cart: &Cart,
        request: &AddRequest,
    ) -> Result<Cart, UpstreamError> {
        let mut state = self.begin(StoreOperation::AddToCart).await?;
        check_version(&state, cart)?;

        let unit_price = request.unit_price.ok_or_else(|| {
            UpstreamError::Rejected(format!("no unit price for {}", request.marketplace_code))
        })?;

        state.next_item += 1;
        let new_item_id = ItemId::new(format!("item-{}", state.next_item));

        let stored = stored_cart(&mut state, cart)?;
        let existing = stored
            .matching_item(
                &request.marketplace_code,
                request.variant_code.as_deref(),
                &request.delivery_intent,
            )
            .map(|item| (item.id.clone(), item.qty));

        match existing {
            Some((item_id, qty)) => {
                stored.set_item_qty(&item_id, qty.saturating_add(request.qty));
            }
            None => {
                let mut item = CartItem::new(
                    new_item_id,
                    request.marketplace_code.clone(),
                    request.qty,
                    unit_price,
                )
                .with_delivery_intent(request.delivery_intent.clone());
                item.variant_code = request.variant_code.clone();
                stored.insert_item(item);
            }
        }

        stored.bump_version();
        let updated = stored.clone();
        state.mutations += 1;
        Ok(updated)
    }

    async fn update_payment_selection(
        &self,
        _ctx: &CartContext,
        cart: &Cart,
        selection: Option<PaymentSelection>,
    ) -> Result<Cart, UpstreamError> {
        let mut state = self.begin(StoreOperation::UpdatePaymentSelection).await?;
        let stored = stored_cart(&mut state, cart)?;

        stored.set_payment_selection(selection);
        stored.bump_version();
        let updated = stored.clone();
        state.mutations += 1;
        Ok(updated)
    }

    async fn place_order(
        &self,
        _ctx: &CartContext,
        cart: &Cart,
        payment: &PaymentRecord,
    ) -> Result<OrderNumber, UpstreamError> {
        let mut state = self.begin(StoreOperation::PlaceOrder).await?;
        if stored_cart(&mut state, cart)?.is_empty() {
            return Err(UpstreamError::Rejected(format!(
                "cart {} has no items",
                cart.id()
            )));
        }

        let archived = state
            .carts
            .remove(&cart.id())
            .ok_or(UpstreamError::CartNotFound(cart.id()))?;
        state.owners.retain(|_, id| *id != cart.id());

        state.next_order += 1;
        let order_number = OrderNumber::new(format!("ORDER-{:06}", state.next_order));
        state.orders.push(StoredOrder {
            order_number: order_number.clone(),
            cart: archived,
            payment: payment.clone(),
        });
        state.mutations += 1;

        Ok(order_number)
    }
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    products: HashMap<String, Product>,
    unavailable: bool,
}

/// In-memory product catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding the given products.
    pub fn from_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products
            .into_iter()
            .map(|product| (product.marketplace_code().to_string(), product))
            .collect();
        Self {
            state: Arc::new(RwLock::new(InMemoryCatalogState {
                products,
                unavailable: false,
            })),
        }
    }

    pub async fn add_product(&self, product: Product) {
        self.state
            .write()
            .await
            .products
            .insert(product.marketplace_code().to_string(), product);
    }

    /// Makes every lookup fail with an upstream error.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn get(&self, _ctx: &CartContext, marketplace_code: &str) -> Result<Product, CatalogError> {
        let state = self.state.read().await;
        if state.unavailable {
            return Err(UpstreamError::Unavailable("catalog offline".to_string()).into());
        }
        state
            .products
            .get(marketplace_code)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(marketplace_code.to_string()))
    }
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    events: Vec<CartEvent>,
    failing: bool,
}

/// Event publisher that records every accepted event.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to reject events.
    pub async fn set_failing(&self, failing: bool) {
        self.state.write().await.failing = failing;
    }

    /// Returns the recorded events in publication order.
    pub async fn events(&self) -> Vec<CartEvent> {
        self.state.read().await.events.clone()
    }

    pub async fn event_count(&self) -> usize {
        self.state.read().await.events.len()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, _ctx: &CartContext, event: CartEvent) -> Result<(), PublishError> {
        let mut state = self.state.write().await;
        if state.failing {
            return Err(PublishError::Unavailable("event sink offline".to_string()));
        }
        tracing::debug!(event_type = event.event_type(), "event recorded");
        state.events.push(event);
        Ok(())
    }
}
