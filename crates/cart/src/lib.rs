//! Cart layer of the checkout engine.
//!
//! This crate provides:
//! - the cart model (carts, items, delivery intents, payment selections)
//! - contracts for the injected collaborators (cart store, product catalog,
//!   event publisher, validators, pickup location detection)
//! - [`CartService`], which validates requests and drives every cart mutation
//!   through the store's behaviour
//! - in-memory collaborators for tests and local wiring

pub mod behaviour;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod memory;
pub mod model;
pub mod pickup;
pub mod product;
pub mod service;
pub mod validation;

pub use behaviour::{CartBehaviour, CartStore};
pub use config::CartConfig;
pub use context::{Cancelled, CartContext, CartIdentity, GuestSession};
pub use error::{CartError, ErrorClass, UpstreamError};
pub use events::{
    AddedToCartData, CartEvent, ChangedQtyInCartData, EventPublisher, OrderPlacedData,
    PublishError,
};
pub use memory::{
    InMemoryCartStore, InMemoryEventPublisher, InMemoryProductCatalog, StoreOperation, StoredOrder,
};
pub use model::{
    AddRequest, Cart, CartItem, Charge, DeliveryIntent, DeliveryIntentError,
    DeliveryIntentResolver, DeliveryLocationType, DeliveryMethod, ItemUpdateCommand,
    PaymentQualifier, PaymentRecord, PaymentSelection, Transaction, TransactionStatus,
};
pub use pickup::{DetectedLocation, DetectionError, PickupLocationDetector, StaticPickupLocationDetector};
pub use product::{CatalogError, ConfigurableProduct, Product, ProductCatalog, SimpleProduct, Variant};
pub use service::{CartService, CartServiceBuilder};
pub use validation::{
    CartValidator, DeliveryCartValidator, Finding, ItemValidator, MaxQuantityItemValidator,
    Severity, ValidationError, ValidationResult,
};
