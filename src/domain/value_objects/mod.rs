//! Value Objects for pricing

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use crate::{CommerceError, Result};

const CENTS: u32 = 2;

/// Non-negative currency amount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Result<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(CommerceError::invalid(format!("negative amount {amount}")));
        }
        Ok(Self(amount))
    }

    pub fn amount(&self) -> Decimal { self.0 }
    pub fn is_zero(&self) -> bool { self.0.is_zero() }

    pub fn times(&self, qty: Quantity) -> Money { Money(self.0 * Decimal::from(qty.value())) }

    /// Difference floored at zero.
    pub fn saturating_sub(&self, other: Money) -> Money {
        if other.0 >= self.0 { Money::ZERO } else { Money(self.0 - other.0) }
    }

    /// `self * numerator / denominator`, or `None` when the denominator is zero.
    pub fn mul_ratio(&self, numerator: Money, denominator: Money) -> Option<Money> {
        self.0.checked_mul(numerator.0)?.checked_div(denominator.0).map(Money)
    }

    pub fn round_cents(&self) -> Money {
        Money(self.0.round_dp_with_strategy(CENTS, RoundingStrategy::MidpointAwayFromZero))
    }
}

impl TryFrom<Decimal> for Money {
    type Error = CommerceError;
    fn try_from(value: Decimal) -> Result<Self> { Money::new(value) }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self { value.0 }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money { Money(self.0 + rhs.0) }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money { iter.fold(Money::ZERO, Add::add) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:.2}", self.0) }
}

/// Item count, always at least one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub const ONE: Quantity = Quantity(1);

    pub fn new(value: u32) -> Result<Self> {
        if value == 0 { return Err(CommerceError::invalid("quantity must be at least 1")); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: Quantity) -> Self { Self(self.0.saturating_add(other.0)) }
}

impl TryFrom<u32> for Quantity {
    type Error = CommerceError;
    fn try_from(value: u32) -> Result<Self> { Quantity::new(value) }
}

impl From<Quantity> for u32 {
    fn from(value: Quantity) -> Self { value.0 }
}

/// Percentage in the closed range 0..=100.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Percentage(Decimal);

impl Percentage {
    pub fn new(value: Decimal) -> Result<Self> {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            return Err(CommerceError::invalid(format!("percentage {value} outside 0..=100")));
        }
        Ok(Self(value))
    }
    pub fn value(&self) -> Decimal { self.0 }
    pub fn fraction(&self) -> Decimal { self.0 / Decimal::ONE_HUNDRED }
}

impl TryFrom<Decimal> for Percentage {
    type Error = CommerceError;
    fn try_from(value: Decimal) -> Result<Self> { Percentage::new(value) }
}

impl From<Percentage> for Decimal {
    fn from(value: Percentage) -> Self { value.0 }
}

/// Flat amount equal to `pct` of `base`, rounded to cents.
pub fn percentage_of(base: Money, pct: Percentage) -> Money {
    Money(base.0 * pct.fraction()).round_cents()
}

/// Discount as entered at the counter: a flat amount or a percentage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Discount {
    Amount(Money),
    Percentage(Percentage),
}

impl Discount {
    /// Flat amount this discount takes off `base`, never more than `base`.
    pub fn resolve(&self, base: Money) -> Money {
        match self {
            Self::Amount(amount) => (*amount).min(base),
            Self::Percentage(pct) => percentage_of(base, *pct),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_rejects_negative() {
        assert!(matches!(Money::new(dec!(-0.01)), Err(CommerceError::InvalidArgument(_))));
        assert_eq!(Money::new(dec!(0)).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_money_arithmetic() {
        let price = Money::new(dec!(19.99)).unwrap();
        assert_eq!(price.times(Quantity::new(3).unwrap()).amount(), dec!(59.97));
        assert_eq!(price.saturating_sub(Money::new(dec!(25)).unwrap()), Money::ZERO);
        assert_eq!(Money::new(dec!(10.005)).unwrap().round_cents().amount(), dec!(10.01));
        assert_eq!(price.to_string(), "19.99");
    }

    #[test]
    fn test_quantity_rejects_zero() {
        assert!(Quantity::new(0).is_err());
        assert_eq!(Quantity::new(2).unwrap().add(Quantity::ONE).value(), 3);
    }

    #[test]
    fn test_percentage_of() {
        let subtotal = Money::new(dec!(300)).unwrap();
        assert_eq!(percentage_of(subtotal, Percentage::new(dec!(10)).unwrap()).amount(), dec!(30));
        assert_eq!(percentage_of(Money::new(dec!(33.33)).unwrap(), Percentage::new(dec!(15)).unwrap()).amount(), dec!(5.00));
        assert!(Percentage::new(dec!(100.5)).is_err());
    }

    #[test]
    fn test_discount_resolve_caps_at_base() {
        let base = Money::new(dec!(50)).unwrap();
        assert_eq!(Discount::Amount(Money::new(dec!(80)).unwrap()).resolve(base), base);
        assert_eq!(Discount::Percentage(Percentage::new(dec!(20)).unwrap()).resolve(base).amount(), dec!(10));
    }

    #[test]
    fn test_discount_serde_shape() {
        let d: Discount = serde_json::from_str(r#"{"kind":"percentage","value":"10"}"#).unwrap();
        assert_eq!(d, Discount::Percentage(Percentage::new(dec!(10)).unwrap()));
        assert!(serde_json::from_str::<Discount>(r#"{"kind":"amount","value":"-5"}"#).is_err());
    }
}
