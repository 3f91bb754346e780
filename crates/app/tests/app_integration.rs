//! Integration tests for the in-memory wiring and the demo checkout.

use app::config::AppConfig;
use app::{create_default_checkout, offline_split, run_demo_checkout};
use cart::{CartContext, CartEvent, ErrorClass, TransactionStatus};
use common::Money;
use payment::{CheckoutConfig, PaymentError};

#[tokio::test]
async fn test_demo_checkout_places_order() {
    let checkout = create_default_checkout(&AppConfig::default()).await.unwrap();
    let ctx = CartContext::guest("session-1");

    let placed = run_demo_checkout(&checkout, &ctx).await.unwrap();

    assert_eq!(placed.payment.gateway, "offline");
    assert_eq!(placed.payment.total_value(), Money::from_units(40));
    assert!(placed
        .payment
        .transactions
        .iter()
        .all(|t| t.status == TransactionStatus::Open));

    let orders = checkout.store.orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_number, placed.order_number);

    let events = checkout.publisher.events().await;
    assert_eq!(events.len(), 3);
    assert!(matches!(events[0], CartEvent::AddedToCart(_)));
    assert!(matches!(events[2], CartEvent::OrderPlaced(_)));
}

#[tokio::test]
async fn test_demo_checkout_without_offline_gateway() {
    let config = AppConfig {
        checkout: CheckoutConfig {
            enable_offline_payment: false,
            ..CheckoutConfig::default()
        },
        ..AppConfig::default()
    };
    let checkout = create_default_checkout(&config).await.unwrap();

    let err = run_demo_checkout(&checkout, &CartContext::guest("session-1"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        app::error::AppError::Payment(PaymentError::UnknownGateway(_))
    ));
    assert_eq!(err.class(), Some(ErrorClass::InvalidRequest));
    assert!(checkout.store.orders().await.is_empty());
}

#[tokio::test]
async fn test_invalid_return_url_fails_wiring() {
    let config = AppConfig {
        checkout: CheckoutConfig {
            return_url: "not a url".to_string(),
            ..CheckoutConfig::default()
        },
        ..AppConfig::default()
    };

    let result = create_default_checkout(&config).await;
    assert!(matches!(result, Err(app::error::AppError::Config(_))));
}

#[test]
fn test_offline_split_covers_total() {
    let split = offline_split(Money::from_units(40));
    assert_eq!(split.total_value(), Money::from_units(40));
    assert_eq!(split.cart_split().len(), 2);

    let small = offline_split(Money::from_units(4));
    assert_eq!(small.total_value(), Money::from_units(4));
    assert_eq!(small.cart_split().len(), 1);
}
