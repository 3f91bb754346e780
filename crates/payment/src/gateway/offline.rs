//! Offline payment: cash on delivery and cash in advance.

use async_trait::async_trait;
use cart::{Cart, PaymentRecord, Transaction, TransactionStatus};
use common::CorrelationId;
use url::Url;

use super::{FlowRedirect, FlowResult, Method, PaymentGateway};
use crate::error::Result;

pub const OFFLINE_GATEWAY_CODE: &str = "offline";

/// Gateway for payments settled outside the shop.
///
/// There is no provider to talk to: the flow redirects straight back to the
/// shop and every charge of the split becomes an open transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGateway;

impl OfflineGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PaymentGateway for OfflineGateway {
    fn code(&self) -> &str {
        OFFLINE_GATEWAY_CODE
    }

    fn methods(&self) -> Vec<Method> {
        vec![
            Method::new("cash on delivery", "offlinepayment_cashondelivery"),
            Method::new("cash in advance", "offlinepayment_cashinadvance"),
        ]
    }

    async fn get_start_flow_result(
        &self,
        cart: &Cart,
        _correlation_id: &CorrelationId,
        _return_url: &Url,
    ) -> Result<FlowResult> {
        self.check_cart(cart)?;
        Ok(FlowResult::default())
    }

    async fn start_flow(
        &self,
        cart: &Cart,
        _correlation_id: &CorrelationId,
        return_url: &Url,
    ) -> Result<FlowRedirect> {
        self.check_cart(cart)?;
        Ok(FlowRedirect {
            url: return_url.clone(),
        })
    }

    async fn get_flow_result(
        &self,
        cart: &Cart,
        _correlation_id: &CorrelationId,
    ) -> Result<PaymentRecord> {
        let selection = self.check_cart(cart)?;

        let mut record = PaymentRecord::new(OFFLINE_GATEWAY_CODE);
        record.transactions = selection
            .cart_split()
            .iter()
            .map(|(qualifier, charge)| Transaction {
                method: qualifier.method.clone(),
                status: TransactionStatus::Open,
                valued_amount_paid: charge.value,
                amount_paid: charge.price,
                transaction_id: None,
            })
            .collect();

        Ok(record)
    }

    async fn confirm_result(
        &self,
        cart: &Cart,
        _correlation_id: &CorrelationId,
        _payment: &PaymentRecord,
    ) -> Result<()> {
        self.check_cart(cart)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cart::{Charge, PaymentQualifier, PaymentSelection};
    use common::{CartId, Money};

    use super::*;
    use crate::error::PaymentError;

    fn cart_with(selection: PaymentSelection) -> Cart {
        Cart::new(CartId::new()).with_payment_selection(selection)
    }

    fn return_url() -> Url {
        Url::parse("https://shop.example.com/checkout/return").unwrap()
    }

    #[tokio::test]
    async fn test_start_flow_redirects_to_return_url() {
        let cart = cart_with(PaymentSelection::new("offline").with_charge(
            PaymentQualifier::main("offlinepayment_cashinadvance"),
            Charge::of(Money::from_cents(1000)),
        ));

        let redirect = OfflineGateway
            .start_flow(&cart, &CorrelationId::new("c1"), &return_url())
            .await
            .unwrap();
        assert_eq!(redirect.url, return_url());
    }

    #[tokio::test]
    async fn test_flow_result_has_one_open_transaction_per_charge() {
        let cart = cart_with(
            PaymentSelection::new("offline")
                .with_charge(
                    PaymentQualifier::main("offlinepayment_cashondelivery"),
                    Charge::of(Money::from_cents(3000)),
                )
                .with_charge(
                    PaymentQualifier::main("offlinepayment_cashinadvance"),
                    Charge::of(Money::from_cents(1000)),
                ),
        );

        let record = OfflineGateway
            .get_flow_result(&cart, &CorrelationId::new("c1"))
            .await
            .unwrap();

        assert_eq!(record.gateway, "offline");
        assert_eq!(record.transactions.len(), 2);
        assert!(record
            .transactions
            .iter()
            .all(|t| t.status == TransactionStatus::Open));
        assert_eq!(record.total_value(), Money::from_cents(4000));
    }

    #[tokio::test]
    async fn test_unsupported_method_is_rejected() {
        let cart = cart_with(PaymentSelection::new("offline").with_charge(
            PaymentQualifier::main("hosted_creditcard"),
            Charge::of(Money::from_cents(1000)),
        ));

        let result = OfflineGateway
            .get_flow_result(&cart, &CorrelationId::new("c1"))
            .await;
        assert!(matches!(
            result,
            Err(PaymentError::UnsupportedMethod { ref method, .. }) if method == "hosted_creditcard"
        ));
    }

    #[tokio::test]
    async fn test_cart_without_selection_is_rejected() {
        let cart = Cart::new(CartId::new());
        let result = OfflineGateway
            .confirm_result(&cart, &CorrelationId::new("c1"), &PaymentRecord::new("offline"))
            .await;
        assert!(matches!(result, Err(PaymentError::NoPaymentSelection)));
    }
}
