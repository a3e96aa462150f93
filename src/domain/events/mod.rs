//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::refund::DiscountBasis;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum DomainEvent {
    Cart(CartEvent),
    Sale(SaleEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum CartEvent {
    ItemAdded { cart_id: String, product_id: String, quantity: u32 },
    QuantityChanged { cart_id: String, product_id: String, quantity: u32 },
    ItemRemoved { cart_id: String, product_id: String },
    DiscountApplied { cart_id: String, amount: Decimal },
    Cleared { cart_id: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum SaleEvent {
    Opened { sale_id: String, number: u64 },
    DiscountApplied { sale_id: String, amount: Decimal },
    PaymentReceived { sale_id: String, amount: Decimal },
    Returned { sale_id: String, devolution_id: String, refund: Decimal, basis: DiscountBasis },
    CreditIssued { sale_id: String, credit_id: String, amount: Decimal },
}
