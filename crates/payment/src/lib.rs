//! Payment layer of the checkout engine.
//!
//! This crate provides:
//! - the [`PaymentGateway`] trait with an offline gateway (cash on delivery,
//!   cash in advance) and a hosted-page gateway backed by a
//!   [`PaymentProcessor`]
//! - the per-checkout [`FlowState`] machine
//! - [`PaymentOrchestrator`], which binds a cart to its gateway, walks the
//!   payment lifecycle and hands the resulting record to order placement
//!
//! The lifecycle of one checkout, identified by a correlation ID:
//! 1. Start the flow (redirect the customer)
//! 2. Fetch the flow result (a reconciled payment record)
//! 3. Place the order and confirm the payment

pub mod config;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod processor;
pub mod registry;
pub mod state;

pub use config::CheckoutConfig;
pub use error::PaymentError;
pub use gateway::{
    FlowRedirect, FlowResult, HOSTED_GATEWAY_CODE, HostedPageGateway, Method, OFFLINE_GATEWAY_CODE,
    OfflineGateway, PaymentGateway,
};
pub use orchestrator::{PaymentOrchestrator, PlacedOrder};
pub use processor::{
    ChargeState, InMemoryPaymentProcessor, PaymentProcessor, ProcessorCharge, ProcessorError,
};
pub use registry::GatewayRegistry;
pub use state::FlowState;
