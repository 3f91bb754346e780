//! In-memory wiring of the cart and checkout engine.
//!
//! Builds the cart service and the payment orchestrator over in-memory
//! collaborators, seeds a small demo catalog, and runs a complete guest
//! checkout against it.

pub mod config;
pub mod error;

use std::sync::Arc;

use cart::{
    CartContext, CartService, Charge, DeliveryCartValidator, GuestSession, InMemoryCartStore,
    InMemoryEventPublisher, InMemoryProductCatalog, MaxQuantityItemValidator, PaymentQualifier,
    PaymentSelection, Product,
};
use common::{CorrelationId, Money};
use payment::{
    GatewayRegistry, InMemoryPaymentProcessor, OFFLINE_GATEWAY_CODE, PaymentOrchestrator,
    PlacedOrder,
};
use url::Url;

use config::AppConfig;
use error::AppError;

/// Largest quantity a single cart line may hold.
pub const MAX_ITEM_QTY: u32 = 99;

/// Share of the order paid in advance by the demo checkout.
const DEMO_ADVANCE: Money = Money::from_cents(1000);

/// Services and in-memory collaborators of one running engine.
pub struct Checkout {
    pub cart_service: Arc<CartService>,
    pub orchestrator: PaymentOrchestrator,
    pub store: InMemoryCartStore,
    pub catalog: InMemoryProductCatalog,
    pub publisher: InMemoryEventPublisher,
    pub processor: InMemoryPaymentProcessor,
    return_url: Url,
}

impl Checkout {
    /// Where customers come back to after an external payment page.
    pub fn return_url(&self) -> &Url {
        &self.return_url
    }
}

/// Creates the engine over in-memory collaborators and seeds the demo catalog.
pub async fn create_default_checkout(config: &AppConfig) -> Result<Checkout, AppError> {
    let store = InMemoryCartStore::new();
    let catalog = InMemoryProductCatalog::new();
    let publisher = InMemoryEventPublisher::new();
    let processor = InMemoryPaymentProcessor::new();

    for (code, title, cents) in [
        ("kettle", "Kettle", 3000),
        ("mug", "Mug", 500),
        ("teapot", "Teapot", 2450),
    ] {
        catalog
            .add_product(Product::simple(code, title, Money::from_cents(cents)))
            .await;
    }

    let cart_service = CartService::builder(
        Arc::new(store.clone()),
        Arc::new(catalog.clone()),
        Arc::new(publisher.clone()),
    )
    .config(config.cart.clone())
    .cart_validator(Arc::new(DeliveryCartValidator))
    .item_validator(Arc::new(MaxQuantityItemValidator::new(MAX_ITEM_QTY)))
    .build();
    let cart_service = Arc::new(cart_service);

    let registry = GatewayRegistry::from_config(&config.checkout, Arc::new(processor.clone()))?;
    tracing::info!(gateways = ?registry.codes().collect::<Vec<_>>(), "gateways registered");

    Ok(Checkout {
        orchestrator: PaymentOrchestrator::new(registry, cart_service.clone())
            .with_flow_ttl(config.checkout.flow_ttl()),
        cart_service,
        store,
        catalog,
        publisher,
        processor,
        return_url: config.checkout.return_url()?,
    })
}

/// Splits a total into cash on delivery plus a fixed advance.
pub fn offline_split(total: Money) -> PaymentSelection {
    let advance = total.min(DEMO_ADVANCE);
    let mut selection = PaymentSelection::new(OFFLINE_GATEWAY_CODE).with_charge(
        PaymentQualifier::main("offlinepayment_cashinadvance"),
        Charge::of(advance),
    );
    let on_delivery = total - advance;
    if !on_delivery.is_zero() {
        selection = selection.with_charge(
            PaymentQualifier::main("offlinepayment_cashondelivery"),
            Charge::of(on_delivery),
        );
    }
    selection
}

/// Runs a guest checkout: fills the cart, pays offline and places the order.
#[tracing::instrument(skip(checkout, ctx))]
pub async fn run_demo_checkout(
    checkout: &Checkout,
    ctx: &CartContext,
) -> Result<PlacedOrder, AppError> {
    let service = &checkout.cart_service;

    let cart = service
        .add_product(ctx, service.build_add_request("kettle", "", 1, ""))
        .await?;
    let mut session = GuestSession::with_guest_cart(cart.id());

    service
        .add_product(ctx, service.build_add_request("mug", "", 2, "delivery"))
        .await?;

    let validation = service.validate_current_cart(ctx).await?;
    if validation.has_findings() {
        tracing::warn!(findings = validation.findings().len(), "cart has validation findings");
    }

    let cart = service.current_cart(ctx).await?;
    service
        .update_payment_selection(ctx, Some(offline_split(cart.grand_total())))
        .await?;

    let correlation_id = CorrelationId::generate();
    let orchestrator = &checkout.orchestrator;
    orchestrator
        .get_start_flow_result(ctx, &correlation_id, checkout.return_url())
        .await?;
    let redirect = orchestrator
        .start_flow(ctx, &correlation_id, checkout.return_url())
        .await?;
    tracing::debug!(url = %redirect.url, "payment flow started");

    orchestrator.get_flow_result(ctx, &correlation_id).await?;
    let placed = orchestrator
        .place_order(ctx, &mut session, &correlation_id)
        .await?;
    Ok(placed)
}
