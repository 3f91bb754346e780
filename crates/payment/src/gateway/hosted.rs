//! Redirect-based gateway backed by a processor's hosted payment page.

use std::sync::Arc;

use async_trait::async_trait;
use cart::{Cart, Charge, PaymentQualifier, PaymentRecord, Transaction, TransactionStatus};
use common::CorrelationId;
use url::Url;

use super::{FlowRedirect, FlowResult, Method, PaymentGateway};
use crate::error::{PaymentError, Result};
use crate::processor::{ChargeState, PaymentProcessor, ProcessorCharge};

pub const HOSTED_GATEWAY_CODE: &str = "hosted";

/// Gateway that sends the customer to the processor's payment page.
///
/// The result is only available once the processor reports every charge
/// as authorized, captured or failed, and only while those charges still
/// match the cart's split. Confirmation captures the authorized charges.
pub struct HostedPageGateway {
    processor: Arc<dyn PaymentProcessor>,
    page_url: Url,
}

impl HostedPageGateway {
    pub fn new(processor: Arc<dyn PaymentProcessor>, page_url: Url) -> Self {
        Self {
            processor,
            page_url,
        }
    }

    fn redirect_url(&self, session_id: &str, return_url: &Url) -> Url {
        let mut url = self.page_url.clone();
        url.query_pairs_mut()
            .append_pair("session", session_id)
            .append_pair("return_url", return_url.as_str());
        url
    }
}

fn transaction_status(state: ChargeState) -> TransactionStatus {
    match state {
        ChargeState::Pending => TransactionStatus::Open,
        ChargeState::Authorized => TransactionStatus::Authorized,
        ChargeState::Captured => TransactionStatus::Captured,
        ChargeState::Failed => TransactionStatus::Failed,
    }
}

fn to_transaction(charge: ProcessorCharge) -> Transaction {
    Transaction {
        method: charge.method,
        status: transaction_status(charge.state),
        valued_amount_paid: charge.value,
        amount_paid: charge.price,
        transaction_id: Some(charge.reference),
    }
}

#[async_trait]
impl PaymentGateway for HostedPageGateway {
    fn code(&self) -> &str {
        HOSTED_GATEWAY_CODE
    }

    fn methods(&self) -> Vec<Method> {
        vec![
            Method::new("credit card", "hosted_creditcard"),
            Method::new("paypal", "hosted_paypal"),
        ]
    }

    async fn get_start_flow_result(
        &self,
        cart: &Cart,
        _correlation_id: &CorrelationId,
        _return_url: &Url,
    ) -> Result<FlowResult> {
        self.check_cart(cart)?;
        Ok(FlowResult {
            early_place_order: false,
            redirect_url: Some(self.page_url.clone()),
        })
    }

    #[tracing::instrument(skip(self, cart, return_url), fields(cart_id = %cart.id()))]
    async fn start_flow(
        &self,
        cart: &Cart,
        correlation_id: &CorrelationId,
        return_url: &Url,
    ) -> Result<FlowRedirect> {
        let selection = self.check_cart(cart)?;

        let split: Vec<(PaymentQualifier, Charge)> = selection
            .cart_split()
            .iter()
            .map(|(qualifier, charge)| (qualifier.clone(), *charge))
            .collect();
        let session_id = self.processor.open_session(correlation_id, &split).await?;

        tracing::debug!(%session_id, "processor session opened");
        Ok(FlowRedirect {
            url: self.redirect_url(&session_id, return_url),
        })
    }

    async fn get_flow_result(
        &self,
        cart: &Cart,
        correlation_id: &CorrelationId,
    ) -> Result<PaymentRecord> {
        let selection = self.check_cart(cart)?;

        let charges = self.processor.charges(correlation_id).await?;
        let pending = charges.iter().any(|charge| !charge.state.is_definitive());

        let mut record = PaymentRecord::new(HOSTED_GATEWAY_CODE);
        record.transactions = charges.into_iter().map(to_transaction).collect();
        if !record.matches_split(selection) {
            tracing::warn!(%correlation_id, "processor charges do not match the cart split");
            return Err(PaymentError::SplitChanged(correlation_id.clone()));
        }
        if pending {
            return Err(PaymentError::ResultPending(correlation_id.clone()));
        }
        Ok(record)
    }

    #[tracing::instrument(skip(self, cart, payment), fields(cart_id = %cart.id()))]
    async fn confirm_result(
        &self,
        cart: &Cart,
        correlation_id: &CorrelationId,
        payment: &PaymentRecord,
    ) -> Result<()> {
        self.check_cart(cart)?;

        let authorized = payment
            .transactions
            .iter()
            .filter(|t| t.status == TransactionStatus::Authorized)
            .filter_map(|t| t.transaction_id.as_deref());

        for reference in authorized {
            self.processor
                .capture(correlation_id, reference)
                .await
                .map_err(|e| PaymentError::ConfirmationFailed(e.to_string()))?;
            tracing::debug!(reference, "charge captured");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cart::PaymentSelection;
    use common::{CartId, Money};

    use super::*;
    use crate::processor::InMemoryPaymentProcessor;

    fn setup() -> (HostedPageGateway, InMemoryPaymentProcessor, Cart) {
        let processor = InMemoryPaymentProcessor::new();
        let gateway = HostedPageGateway::new(
            Arc::new(processor.clone()),
            Url::parse("https://pay.example.com/hosted").unwrap(),
        );
        let cart = Cart::new(CartId::new()).with_payment_selection(
            PaymentSelection::new("hosted")
                .with_charge(
                    PaymentQualifier::main("hosted_creditcard"),
                    Charge::of(Money::from_cents(3000)),
                )
                .with_charge(
                    PaymentQualifier::main("hosted_paypal"),
                    Charge::of(Money::from_cents(1000)),
                ),
        );
        (gateway, processor, cart)
    }

    fn return_url() -> Url {
        Url::parse("https://shop.example.com/checkout/return").unwrap()
    }

    #[tokio::test]
    async fn test_start_flow_redirects_to_hosted_page() {
        let (gateway, processor, cart) = setup();
        let id = CorrelationId::new("c1");

        let redirect = gateway.start_flow(&cart, &id, &return_url()).await.unwrap();

        assert_eq!(redirect.url.host_str(), Some("pay.example.com"));
        assert!(redirect
            .url
            .query_pairs()
            .any(|(key, value)| key == "return_url" && value == return_url().as_str()));
        assert_eq!(processor.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_result_is_withheld_while_pending() {
        let (gateway, processor, cart) = setup();
        let id = CorrelationId::new("c1");
        gateway.start_flow(&cart, &id, &return_url()).await.unwrap();

        let result = gateway.get_flow_result(&cart, &id).await;
        assert!(matches!(result, Err(PaymentError::ResultPending(_))));

        processor
            .settle(&id, "hosted_creditcard", ChargeState::Authorized)
            .await;
        let result = gateway.get_flow_result(&cart, &id).await;
        assert!(matches!(result, Err(PaymentError::ResultPending(_))));

        processor
            .settle(&id, "hosted_paypal", ChargeState::Failed)
            .await;
        let record = gateway.get_flow_result(&cart, &id).await.unwrap();
        assert_eq!(record.transactions.len(), 2);
        assert!(record
            .transactions
            .iter()
            .any(|t| t.status == TransactionStatus::Failed));
    }

    #[tokio::test]
    async fn test_confirm_captures_authorized_charges() {
        let (gateway, processor, cart) = setup();
        let id = CorrelationId::new("c1");
        gateway.start_flow(&cart, &id, &return_url()).await.unwrap();
        processor.authorize_all(&id).await;

        let record = gateway.get_flow_result(&cart, &id).await.unwrap();
        gateway.confirm_result(&cart, &id, &record).await.unwrap();

        assert_eq!(processor.captured_count().await, 2);
    }

    #[tokio::test]
    async fn test_capture_failure_is_confirmation_failure() {
        let (gateway, processor, cart) = setup();
        let id = CorrelationId::new("c1");
        gateway.start_flow(&cart, &id, &return_url()).await.unwrap();
        processor.authorize_all(&id).await;
        let record = gateway.get_flow_result(&cart, &id).await.unwrap();
        processor.set_fail_on_capture(true).await;

        let result = gateway.confirm_result(&cart, &id, &record).await;
        assert!(matches!(result, Err(PaymentError::ConfirmationFailed(_))));
    }

    #[tokio::test]
    async fn test_result_is_refused_after_split_changed() {
        let (gateway, processor, cart) = setup();
        let id = CorrelationId::new("c1");
        gateway.start_flow(&cart, &id, &return_url()).await.unwrap();
        processor.authorize_all(&id).await;

        let changed = Cart::new(cart.id()).with_payment_selection(
            PaymentSelection::new("hosted")
                .with_charge(
                    PaymentQualifier::main("hosted_creditcard"),
                    Charge::of(Money::from_cents(1000)),
                )
                .with_charge(
                    PaymentQualifier::main("hosted_paypal"),
                    Charge::of(Money::from_cents(3000)),
                ),
        );
        let result = gateway.get_flow_result(&changed, &id).await;
        assert!(matches!(result, Err(PaymentError::SplitChanged(_))));

        gateway.start_flow(&changed, &id, &return_url()).await.unwrap();
        processor.authorize_all(&id).await;
        let record = gateway.get_flow_result(&changed, &id).await.unwrap();
        assert!(record.matches_split(changed.payment_selection().unwrap()));
        assert_eq!(processor.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_offline_cart_is_rejected_without_opening_session() {
        let (gateway, processor, _) = setup();
        let cart = Cart::new(CartId::new()).with_payment_selection(
            PaymentSelection::new("offline").with_charge(
                PaymentQualifier::main("offlinepayment_cashondelivery"),
                Charge::of(Money::from_cents(1000)),
            ),
        );

        let result = gateway
            .start_flow(&cart, &CorrelationId::new("c1"), &return_url())
            .await;
        assert!(matches!(result, Err(PaymentError::GatewayMismatch { .. })));
        assert_eq!(processor.session_count().await, 0);
    }
}
