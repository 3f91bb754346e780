//! Cart mutation service.

use std::future::Future;
use std::sync::Arc;

use common::{ItemId, OrderNumber};

use crate::behaviour::{CartBehaviour, CartStore};
use crate::config::CartConfig;
use crate::context::{CartContext, GuestSession};
use crate::error::{CartError, Result, UpstreamError};
use crate::events::{CartEvent, EventPublisher};
use crate::model::{
    AddRequest, Cart, CartItem, DeliveryIntentResolver, ItemUpdateCommand, PaymentRecord,
    PaymentSelection,
};
use crate::pickup::PickupLocationDetector;
use crate::product::{CatalogError, Product, ProductCatalog};
use crate::validation::{CartValidator, ItemValidator, ValidationResult};

/// Applies cart mutations through the store's behaviour.
///
/// The service never changes a [`Cart`] itself: it validates the request,
/// resolves what is missing, sends one command to the behaviour and
/// publishes the matching event. Every collaborator call is raced against
/// the context's cancellation token.
pub struct CartService {
    store: Arc<dyn CartStore>,
    catalog: Arc<dyn ProductCatalog>,
    publisher: Arc<dyn EventPublisher>,
    resolver: DeliveryIntentResolver,
    cart_validator: Option<Arc<dyn CartValidator>>,
    item_validator: Option<Arc<dyn ItemValidator>>,
    pickup_detector: Option<Arc<dyn PickupLocationDetector>>,
    config: CartConfig,
}

/// Builder for [`CartService`]; optional collaborators are set once here.
pub struct CartServiceBuilder {
    service: CartService,
}

impl CartServiceBuilder {
    pub fn config(mut self, config: CartConfig) -> Self {
        self.service.config = config;
        self
    }

    pub fn cart_validator(mut self, validator: Arc<dyn CartValidator>) -> Self {
        self.service.cart_validator = Some(validator);
        self
    }

    pub fn item_validator(mut self, validator: Arc<dyn ItemValidator>) -> Self {
        self.service.item_validator = Some(validator);
        self
    }

    pub fn pickup_detector(mut self, detector: Arc<dyn PickupLocationDetector>) -> Self {
        self.service.pickup_detector = Some(detector);
        self
    }

    pub fn build(self) -> CartService {
        self.service
    }
}

/// Races a collaborator call against cancellation and tags failures with
/// the name of the call.
async fn call<T, F>(ctx: &CartContext, operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, UpstreamError>>,
{
    match ctx.run_until_cancelled(fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(CartError::Upstream { operation, source }),
        Err(_) => Err(CartError::Cancelled { operation }),
    }
}

impl CartService {
    /// Starts building a service from its required collaborators.
    pub fn builder(
        store: Arc<dyn CartStore>,
        catalog: Arc<dyn ProductCatalog>,
        publisher: Arc<dyn EventPublisher>,
    ) -> CartServiceBuilder {
        CartServiceBuilder {
            service: CartService {
                store,
                catalog,
                publisher,
                resolver: DeliveryIntentResolver::new(),
                cart_validator: None,
                item_validator: None,
                pickup_detector: None,
                config: CartConfig::default(),
            },
        }
    }

    pub fn config(&self) -> &CartConfig {
        &self.config
    }

    /// Loads the current cart.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn current_cart(&self, ctx: &CartContext) -> Result<Cart> {
        let result = self.load(ctx).await.map(|(cart, _)| cart);
        observe("CurrentCart", result)
    }

    /// Sets the quantity of an item; a quantity below one removes it.
    ///
    /// The quantity-changed event is published before the update is
    /// committed.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn update_item_qty(
        &self,
        ctx: &CartContext,
        item_id: &ItemId,
        qty: i64,
    ) -> Result<Cart> {
        let result = self.update_item_qty_inner(ctx, item_id, qty).await;
        observe("UpdateItemQty", result)
    }

    async fn update_item_qty_inner(
        &self,
        ctx: &CartContext,
        item_id: &ItemId,
        qty: i64,
    ) -> Result<Cart> {
        let (cart, behaviour) = self.load(ctx).await?;
        let item = find_item(&cart, item_id)?;

        if qty < 1 {
            return self.delete_loaded(ctx, &cart, behaviour, item).await;
        }

        let qty_after = u32::try_from(qty).unwrap_or(u32::MAX);
        self.publish(
            ctx,
            CartEvent::changed_qty_in_cart(cart.id(), &item, item.qty, qty_after),
        )
        .await;

        let updated = call(
            ctx,
            "UpdateItem",
            behaviour.update_item(ctx, &cart, item_id, ItemUpdateCommand::qty(qty_after)),
        )
        .await?;

        metrics::counter!("cart_item_quantity_changes_total").increment(1);
        tracing::info!(cart_id = %cart.id(), %item_id, qty_before = item.qty, qty_after, "item quantity updated");
        Ok(updated)
    }

    /// Removes an item from the current cart.
    ///
    /// The quantity-changed event is only published once the deletion has
    /// been committed.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn remove_item(&self, ctx: &CartContext, item_id: &ItemId) -> Result<Cart> {
        let result: Result<Cart> = async {
            let (cart, behaviour) = self.load(ctx).await?;
            let item = find_item(&cart, item_id)?;
            self.delete_loaded(ctx, &cart, behaviour, item).await
        }
        .await;
        observe("DeleteItem", result)
    }

    async fn delete_loaded(
        &self,
        ctx: &CartContext,
        cart: &Cart,
        behaviour: Arc<dyn CartBehaviour>,
        item: CartItem,
    ) -> Result<Cart> {
        let updated = call(ctx, "DeleteItem", behaviour.delete_item(ctx, cart, &item.id)).await?;

        self.publish(
            ctx,
            CartEvent::changed_qty_in_cart(cart.id(), &item, item.qty, 0),
        )
        .await;

        metrics::counter!("cart_item_quantity_changes_total").increment(1);
        tracing::info!(cart_id = %cart.id(), item_id = %item.id, qty_before = item.qty, "item removed");
        Ok(updated)
    }

    /// Adds a product to the current cart.
    ///
    /// Product checks and item validation run before the cart is loaded;
    /// nothing is committed or published when one of them fails.
    #[tracing::instrument(skip(self, ctx, request), fields(marketplace_code = %request.marketplace_code))]
    pub async fn add_product(&self, ctx: &CartContext, request: AddRequest) -> Result<Cart> {
        let result = self.add_product_inner(ctx, request).await;
        observe("AddProduct", result)
    }

    async fn add_product_inner(&self, ctx: &CartContext, request: AddRequest) -> Result<Cart> {
        let product = self.check_product_for_add_request(ctx, &request).await?;
        let request = match product.price() {
            Some(price) => request.with_unit_price(price),
            None => request,
        };

        if let Some(validator) = &self.item_validator {
            ctx.run_until_cancelled(validator.validate(ctx, &request, &product))
                .await
                .map_err(|_| CartError::Cancelled {
                    operation: "ValidateItem",
                })??;
        }

        let (cart, behaviour) = self.load(ctx).await?;
        let request = self.detect_pickup_location(ctx, &product, request).await?;

        let updated = call(ctx, "AddToCart", behaviour.add_to_cart(ctx, &cart, &request)).await?;

        self.publish(ctx, CartEvent::added_to_cart(&request)).await;

        metrics::counter!("cart_items_added_total").increment(1);
        tracing::info!(
            cart_id = %cart.id(),
            qty = request.qty,
            delivery_intent = %request.delivery_intent,
            "product added to cart"
        );
        Ok(updated)
    }

    /// Looks up the product and binds the requested variant of a
    /// configurable product.
    async fn check_product_for_add_request(
        &self,
        ctx: &CartContext,
        request: &AddRequest,
    ) -> Result<Product> {
        let lookup = ctx
            .run_until_cancelled(self.catalog.get(ctx, &request.marketplace_code))
            .await
            .map_err(|_| CartError::Cancelled {
                operation: "GetProduct",
            })?;

        let product = match lookup {
            Ok(product) => product,
            Err(CatalogError::NotFound(marketplace_code)) => {
                return Err(CartError::ProductNotFound { marketplace_code });
            }
            Err(CatalogError::Upstream(source)) => {
                return Err(CartError::Upstream {
                    operation: "GetProduct",
                    source,
                });
            }
        };

        match product {
            Product::Simple(_) => Ok(product),
            Product::Configurable(configurable) => {
                let variant_code = request
                    .variant_code
                    .as_deref()
                    .filter(|code| !code.is_empty())
                    .ok_or_else(|| CartError::VariantRequired {
                        marketplace_code: configurable.marketplace_code.clone(),
                    })?;

                let variant = configurable
                    .variant(variant_code)
                    .cloned()
                    .ok_or_else(|| CartError::VariantNotFound {
                        marketplace_code: configurable.marketplace_code.clone(),
                        variant_code: variant_code.to_string(),
                    })?;

                Ok(Product::Configurable(configurable.with_active_variant(variant)))
            }
        }
    }

    /// Fills in a pickup location when the request asks for pickup without
    /// naming one. Detection failures leave the request unchanged.
    async fn detect_pickup_location(
        &self,
        ctx: &CartContext,
        product: &Product,
        mut request: AddRequest,
    ) -> Result<AddRequest> {
        let Some(detector) = &self.pickup_detector else {
            return Ok(request);
        };
        if !request.delivery_intent.needs_location_detection() {
            return Ok(request);
        }

        let detected = ctx
            .run_until_cancelled(detector.detect(ctx, product, &request))
            .await
            .map_err(|_| CartError::Cancelled {
                operation: "DetectPickupLocation",
            })?;

        match detected {
            Ok(location) => {
                tracing::debug!(location_code = %location.code, "pickup location detected");
                request.delivery_intent = request
                    .delivery_intent
                    .with_location(location.location_type, location.code);
            }
            Err(e) => {
                tracing::warn!(error = %e, "pickup location detection failed");
            }
        }
        Ok(request)
    }

    /// Runs the cart validator, if one is configured.
    #[tracing::instrument(skip(self, ctx, cart), fields(cart_id = %cart.id()))]
    pub async fn validate_cart(&self, ctx: &CartContext, cart: &Cart) -> ValidationResult {
        match &self.cart_validator {
            Some(validator) => {
                validator
                    .validate(ctx, cart, self.config.default_delivery_method_for_validation)
                    .await
            }
            None => ValidationResult::empty(),
        }
    }

    /// Loads the current cart and validates it.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn validate_current_cart(&self, ctx: &CartContext) -> Result<ValidationResult> {
        let result = self.load(ctx).await;
        let (cart, _) = observe("ValidateCurrentCart", result)?;
        Ok(self.validate_cart(ctx, &cart).await)
    }

    /// Binds the current cart to a payment gateway and split.
    ///
    /// `None` clears the selection. The split is stored as given; gateways
    /// check it when the payment flow runs.
    #[tracing::instrument(skip(self, ctx, selection))]
    pub async fn update_payment_selection(
        &self,
        ctx: &CartContext,
        selection: Option<PaymentSelection>,
    ) -> Result<Cart> {
        let result: Result<Cart> = async {
            let (cart, behaviour) = self.load(ctx).await?;
            let gateway = selection.as_ref().map(|s| s.gateway().to_string());
            let updated = call(
                ctx,
                "UpdatePaymentSelection",
                behaviour.update_payment_selection(ctx, &cart, selection),
            )
            .await?;

            tracing::info!(cart_id = %cart.id(), ?gateway, "payment selection updated");
            Ok(updated)
        }
        .await;
        observe("UpdatePaymentSelection", result)
    }

    /// Turns the current cart into an order.
    ///
    /// On success the order-placed event is published and the guest cart
    /// reference is dropped from the session. On failure neither happens.
    #[tracing::instrument(skip(self, ctx, session, payment), fields(gateway = %payment.gateway))]
    pub async fn place_order(
        &self,
        ctx: &CartContext,
        session: &mut GuestSession,
        payment: &PaymentRecord,
    ) -> Result<OrderNumber> {
        let result: Result<OrderNumber> = async {
            let (cart, behaviour) = self.load(ctx).await?;
            let order_number =
                call(ctx, "PlaceOrder", behaviour.place_order(ctx, &cart, payment)).await?;

            self.publish(ctx, CartEvent::order_placed(cart.id(), order_number.clone()))
                .await;
            session.clear_guest_cart();

            metrics::counter!("cart_orders_placed_total").increment(1);
            tracing::info!(cart_id = %cart.id(), %order_number, "order placed");
            Ok(order_number)
        }
        .await;
        observe("PlaceOrder", result)
    }

    /// Builds an add request from raw request values.
    ///
    /// A negative quantity becomes zero and an empty intent falls back to the
    /// configured default.
    pub fn build_add_request(
        &self,
        marketplace_code: &str,
        variant_code: &str,
        qty: i64,
        delivery_intent: &str,
    ) -> AddRequest {
        let representation = if delivery_intent.trim().is_empty() {
            self.config.default_delivery_intent.as_str()
        } else {
            delivery_intent
        };

        AddRequest::new(marketplace_code, qty, self.resolver.resolve(representation))
            .with_variant(variant_code)
    }

    async fn load(&self, ctx: &CartContext) -> Result<(Cart, Arc<dyn CartBehaviour>)> {
        call(ctx, "GetCart", self.store.get_cart(ctx)).await
    }

    /// Publishes an event; failures are logged and dropped.
    async fn publish(&self, ctx: &CartContext, event: CartEvent) {
        let event_type = event.event_type();
        if let Err(e) = self.publisher.publish(ctx, event).await {
            tracing::warn!(event_type, error = %e, "failed to publish cart event");
        }
    }
}

fn find_item(cart: &Cart, item_id: &ItemId) -> Result<CartItem> {
    cart.item(item_id)
        .cloned()
        .ok_or_else(|| CartError::ItemNotFound {
            item_id: item_id.clone(),
        })
}

/// Logs and counts a failed public operation.
fn observe<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        metrics::counter!(
            "cart_operation_failures_total",
            "operation" => operation,
            "class" => e.class().as_str()
        )
        .increment(1);
        tracing::error!(operation, error = %e, "cart operation failed");
    }
    result
}
