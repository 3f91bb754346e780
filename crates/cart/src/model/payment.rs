//! Payment selection on the cart and the payment record handed to order placement.

use std::collections::BTreeMap;

use common::Money;
use serde::{Deserialize, Serialize};

/// Identifies one slice of a split payment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PaymentQualifier {
    /// Payment method code, e.g. `offlinepayment_cashondelivery`.
    pub method: String,
    /// Free-form qualifier distinguishing several charges of the same method.
    pub charge_qualifier: String,
}

impl PaymentQualifier {
    pub fn new(method: impl Into<String>, charge_qualifier: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            charge_qualifier: charge_qualifier.into(),
        }
    }

    /// Qualifier for the main charge of a method.
    pub fn main(method: impl Into<String>) -> Self {
        Self::new(method, "main")
    }
}

/// Amount charged for one payment qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    /// Amount in the cart's currency.
    pub value: Money,
    /// Amount in the currency the payment method charges.
    pub price: Money,
}

impl Charge {
    /// A charge whose price equals its value.
    pub fn of(amount: Money) -> Self {
        Self {
            value: amount,
            price: amount,
        }
    }
}

/// The gateway a cart is bound to and how its total is split across
/// payment methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSelection {
    gateway: String,
    #[serde(with = "split_entries")]
    cart_split: BTreeMap<PaymentQualifier, Charge>,
}

impl PaymentSelection {
    pub fn new(gateway: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
            cart_split: BTreeMap::new(),
        }
    }

    /// Adds a charge to the split, replacing any charge for the same qualifier.
    pub fn with_charge(mut self, qualifier: PaymentQualifier, charge: Charge) -> Self {
        self.cart_split.insert(qualifier, charge);
        self
    }

    /// Code of the gateway the cart is bound to.
    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    pub fn cart_split(&self) -> &BTreeMap<PaymentQualifier, Charge> {
        &self.cart_split
    }

    /// Sum of all charge values.
    pub fn total_value(&self) -> Money {
        self.cart_split.values().map(|charge| charge.value).sum()
    }
}

/// State of one transaction in a payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Open,
    Authorized,
    Captured,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Open => "open",
            TransactionStatus::Authorized => "authorized",
            TransactionStatus::Captured => "captured",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One paid (or to-be-paid) slice of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub method: String,
    pub status: TransactionStatus,
    pub valued_amount_paid: Money,
    pub amount_paid: Money,
    /// Reference assigned by the payment processor, if any.
    pub transaction_id: Option<String>,
}

/// Reconciled payment for an order, produced by a payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub gateway: String,
    pub transactions: Vec<Transaction>,
}

impl PaymentRecord {
    pub fn new(gateway: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
            transactions: Vec::new(),
        }
    }

    /// Sum of the valued amounts of all transactions.
    pub fn total_value(&self) -> Money {
        self.transactions
            .iter()
            .map(|transaction| transaction.valued_amount_paid)
            .sum()
    }

    /// Returns true if the transactions pay exactly the charges of the
    /// split, method by method.
    pub fn matches_split(&self, selection: &PaymentSelection) -> bool {
        let mut paid: Vec<(&str, Money)> = self
            .transactions
            .iter()
            .map(|t| (t.method.as_str(), t.valued_amount_paid))
            .collect();
        let mut due: Vec<(&str, Money)> = selection
            .cart_split()
            .iter()
            .map(|(qualifier, charge)| (qualifier.method.as_str(), charge.value))
            .collect();
        paid.sort();
        due.sort();
        paid == due
    }
}

/// Serializes the split as a list of `(qualifier, charge)` pairs, since
/// qualifiers cannot be JSON object keys.
mod split_entries {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::{Charge, PaymentQualifier};

    pub fn serialize<S>(
        split: &BTreeMap<PaymentQualifier, Charge>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(split.iter())
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<PaymentQualifier, Charge>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries: Vec<(PaymentQualifier, Charge)> = Vec::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_value() {
        let selection = PaymentSelection::new("offline")
            .with_charge(
                PaymentQualifier::main("offlinepayment_cashondelivery"),
                Charge::of(Money::from_units(30)),
            )
            .with_charge(
                PaymentQualifier::main("offlinepayment_cashinadvance"),
                Charge::of(Money::from_units(10)),
            );

        assert_eq!(selection.gateway(), "offline");
        assert_eq!(selection.cart_split().len(), 2);
        assert_eq!(selection.total_value(), Money::from_units(40));
    }

    #[test]
    fn test_selection_serialization() {
        let selection = PaymentSelection::new("offline").with_charge(
            PaymentQualifier::new("offlinepayment_cashinadvance", "voucher"),
            Charge {
                value: Money::from_cents(1000),
                price: Money::from_cents(1100),
            },
        );
        let json = serde_json::to_string(&selection).unwrap();
        let deserialized: PaymentSelection = serde_json::from_str(&json).unwrap();
        assert_eq!(selection, deserialized);
    }

    #[test]
    fn test_record_matches_split_per_method() {
        let selection = PaymentSelection::new("hosted")
            .with_charge(
                PaymentQualifier::main("hosted_creditcard"),
                Charge::of(Money::from_units(25)),
            )
            .with_charge(
                PaymentQualifier::main("hosted_paypal"),
                Charge::of(Money::from_units(15)),
            );
        let transaction = |method: &str, units| Transaction {
            method: method.to_string(),
            status: TransactionStatus::Authorized,
            valued_amount_paid: Money::from_units(units),
            amount_paid: Money::from_units(units),
            transaction_id: None,
        };

        let mut record = PaymentRecord::new("hosted");
        record.transactions = vec![
            transaction("hosted_paypal", 15),
            transaction("hosted_creditcard", 25),
        ];
        assert!(record.matches_split(&selection));

        // Same total, different methods.
        record.transactions = vec![
            transaction("hosted_paypal", 25),
            transaction("hosted_creditcard", 15),
        ];
        assert_eq!(record.total_value(), selection.total_value());
        assert!(!record.matches_split(&selection));

        record.transactions.pop();
        assert!(!record.matches_split(&selection));
    }

    #[test]
    fn test_transaction_status_serializes_lowercase() {
        let json = serde_json::to_string(&TransactionStatus::Authorized).unwrap();
        assert_eq!(json, "\"authorized\"");
    }
}
