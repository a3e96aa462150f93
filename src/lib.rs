//! LogCell Commerce Core
//!
//! Pricing rules behind the LogCell storefront and point of sale.
//!
//! ## Features
//! - Shopping cart with flat and percentage coupons
//! - Proportional refunds for partial and full returns
//! - Sale totals, payments and cumulative returned quantities
//! - Store credit issued from returns
//! - HTTP service for cart sessions and refund quotes

pub mod config;
pub mod domain;
pub mod http;
pub mod store;

use rust_decimal::Decimal;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommerceError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: u32,
        available: u32,
    },

    #[error("Sale line not found: {0}")]
    SaleLineNotFound(String),

    #[error("Return of {requested} exceeds remaining {remaining} on line {line_id}")]
    ReturnExceedsRemaining {
        line_id: String,
        requested: u32,
        remaining: u32,
    },

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Sale has no customer to credit")]
    MissingCustomer,

    #[error("Insufficient store credit: balance {balance}, requested {requested}")]
    InsufficientCredit { balance: Decimal, requested: Decimal },
}

impl CommerceError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

pub type Result<T> = std::result::Result<T, CommerceError>;
