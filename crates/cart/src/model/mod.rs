//! Cart model: the aggregate, its items, delivery intents and payment data.

mod add_request;
mod cart;
mod delivery;
mod payment;

pub use add_request::AddRequest;
pub use cart::{Cart, CartItem, ItemUpdateCommand};
pub use delivery::{
    DeliveryIntent, DeliveryIntentError, DeliveryIntentResolver, DeliveryLocationType,
    DeliveryMethod,
};
pub use payment::{
    Charge, PaymentQualifier, PaymentRecord, PaymentSelection, Transaction, TransactionStatus,
};
