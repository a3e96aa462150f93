//! Return refund calculation
//!
//! A return gives back the value of the returned lines minus the share of the
//! original sale's discount those lines carried. The share is the discount
//! ratio times the returned subtotal; which total the ratio is taken against is
//! selected with [`DiscountBasis`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::value_objects::{Money, Quantity};
use crate::{CommerceError, Result};

/// Total the sale discount is measured against when prorating it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountBasis {
    /// `discount / (total + discount)`: the share of the pre-discount value.
    #[default]
    PreDiscount,
    /// `discount / total`: measured against the discounted total. Over-weights
    /// the discount on partial returns; matches refunds already on record.
    PostDiscount,
}

impl FromStr for DiscountBasis {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pre_discount" | "pre" => Ok(Self::PreDiscount),
            "post_discount" | "post" => Ok(Self::PostDiscount),
            other => Err(CommerceError::invalid(format!("unknown discount basis '{other}'"))),
        }
    }
}

impl fmt::Display for DiscountBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::PreDiscount => write!(f, "pre_discount"), Self::PostDiscount => write!(f, "post_discount") }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnedLine {
    pub unit_price: Money,
    pub quantity: Quantity,
}

impl ReturnedLine {
    pub fn new(unit_price: Decimal, quantity: u32) -> Result<Self> {
        Ok(Self { unit_price: Money::new(unit_price)?, quantity: Quantity::new(quantity)? })
    }

    pub fn subtotal(&self) -> Money { self.unit_price.times(self.quantity) }
}

/// Numbers of the original sale plus the lines being given back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReturnRequest {
    original_sale_total: Money,
    original_sale_discount: Money,
    returned_lines: Vec<ReturnedLine>,
}

impl ReturnRequest {
    pub fn new(original_sale_total: Decimal, original_sale_discount: Decimal, returned_lines: Vec<ReturnedLine>) -> Result<Self> {
        let original_sale_total = Money::new(original_sale_total)?;
        let original_sale_discount = Money::new(original_sale_discount)?;
        if returned_lines.is_empty() {
            return Err(CommerceError::invalid("a return needs at least one line"));
        }
        let request = Self { original_sale_total, original_sale_discount, returned_lines };
        let gross = original_sale_total + original_sale_discount;
        // Zero-value sales refund nothing, whatever is returned.
        if !original_sale_total.is_zero() && request.returned_subtotal() > gross {
            return Err(CommerceError::invalid(format!(
                "returned value {} exceeds the sale's pre-discount value {gross}", request.returned_subtotal()
            )));
        }
        Ok(request)
    }

    pub fn original_sale_total(&self) -> Money { self.original_sale_total }
    pub fn original_sale_discount(&self) -> Money { self.original_sale_discount }
    pub fn returned_lines(&self) -> &[ReturnedLine] { &self.returned_lines }
    pub fn returned_subtotal(&self) -> Money { self.returned_lines.iter().map(ReturnedLine::subtotal).sum() }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RefundBreakdown {
    pub returned_subtotal: Money,
    pub proportional_discount: Money,
    pub refund_total: Money,
    pub basis: DiscountBasis,
}

impl RefundBreakdown {
    fn new(returned_subtotal: Money, proportional_discount: Money, basis: DiscountBasis) -> Self {
        Self { returned_subtotal, proportional_discount, refund_total: returned_subtotal.saturating_sub(proportional_discount), basis }
    }

    /// Re-bases the prorated discount on what earlier returns of the same sale
    /// left of its discount. The return that empties the sale withholds
    /// exactly the remainder, so all refunds together add up to the sale total.
    pub fn within_remaining(self, remaining_discount: Money, closes_sale: bool) -> Self {
        let proportional = if closes_sale { remaining_discount } else { self.proportional_discount.min(remaining_discount) };
        Self::new(self.returned_subtotal, proportional.min(self.returned_subtotal), self.basis)
    }
}

/// Refund owed for `request`.
///
/// The prorated discount is rounded to cents and never exceeds the sale's
/// discount or the returned value, so returning everything refunds exactly
/// the sale total under either basis. A zero-value sale refunds nothing.
pub fn calculate_refund(request: &ReturnRequest, basis: DiscountBasis) -> RefundBreakdown {
    let returned_subtotal = request.returned_subtotal();
    let discount = request.original_sale_discount;

    if request.original_sale_total.is_zero() {
        tracing::debug!(%returned_subtotal, "zero-value sale, refund short-circuited to zero");
        return RefundBreakdown::new(returned_subtotal, returned_subtotal, basis);
    }
    if discount.is_zero() {
        return RefundBreakdown::new(returned_subtotal, Money::ZERO, basis);
    }

    let denominator = match basis {
        DiscountBasis::PreDiscount => request.original_sale_total + discount,
        DiscountBasis::PostDiscount => request.original_sale_total,
    };
    let proportional = match returned_subtotal.mul_ratio(discount, denominator) {
        Some(share) => share.round_cents().min(discount).min(returned_subtotal),
        None => {
            tracing::warn!(%returned_subtotal, %denominator, "discount proration overflowed, withholding full discount");
            discount.min(returned_subtotal)
        }
    };
    RefundBreakdown::new(returned_subtotal, proportional, basis)
}
