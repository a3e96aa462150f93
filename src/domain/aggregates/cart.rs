//! Cart Aggregate
//!
//! Lines are keyed by product id; adding a product already in the cart grows
//! its quantity instead of appending a second line. The discount is a single
//! flat amount that replaces any previous one. Percentage coupons are turned
//! into a flat amount by the caller (see [`crate::domain::percentage_of`]).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::{Money, Quantity};
use crate::{CommerceError, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cart {
    id: String,
    lines: Vec<CartLine>,
    discount: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub name: String,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub unit_price: Money,
    pub quantity: Quantity,
}

impl CartLine {
    pub fn line_subtotal(&self) -> Money { self.unit_price.times(self.quantity) }
}

/// Unchecked input for [`Cart::add_item`].
#[derive(Clone, Debug, Deserialize)]
pub struct NewCartLine {
    pub product_id: String,
    pub name: String,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl Default for Cart {
    fn default() -> Self { Self::new() }
}

impl Cart {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(), lines: vec![], discount: Money::ZERO,
            created_at: now, updated_at: now, events: vec![],
        }
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn line(&self, product_id: &str) -> Option<&CartLine> { self.lines.iter().find(|l| l.product_id == product_id) }
    pub fn discount(&self) -> Money { self.discount }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Adds `item`, merging into the existing line for the same product.
    ///
    /// A merged line keeps the unit price it was first added with.
    pub fn add_item(&mut self, item: NewCartLine) -> Result<()> {
        if item.product_id.trim().is_empty() {
            return Err(CommerceError::invalid("product id must not be empty"));
        }
        let unit_price = Money::new(item.unit_price)?;
        let quantity = Quantity::new(item.quantity)?;

        let product_id = item.product_id.clone();
        if let Some(existing) = self.lines.iter_mut().find(|l| l.product_id == item.product_id) {
            existing.quantity = existing.quantity.add(quantity);
        } else {
            self.lines.push(CartLine {
                product_id: item.product_id, name: item.name, brand: item.brand,
                image_url: item.image_url, unit_price, quantity,
            });
        }
        self.touch();
        self.raise_event(CartEvent::ItemAdded { cart_id: self.id.clone(), product_id, quantity: quantity.value() });
        Ok(())
    }

    /// Sets the quantity of a line. Zero removes the line; unknown ids are ignored.
    pub fn update_quantity(&mut self, product_id: &str, new_quantity: u32) {
        let Ok(quantity) = Quantity::new(new_quantity) else {
            self.remove_item(product_id);
            return;
        };
        let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product_id) else { return };
        line.quantity = quantity;
        self.touch();
        self.raise_event(CartEvent::QuantityChanged {
            cart_id: self.id.clone(), product_id: product_id.to_string(), quantity: new_quantity,
        });
    }

    /// Removes the line for `product_id`, returning whether one was present.
    pub fn remove_item(&mut self, product_id: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        if self.lines.len() == before { return false; }
        self.touch();
        self.raise_event(CartEvent::ItemRemoved { cart_id: self.id.clone(), product_id: product_id.to_string() });
        true
    }

    /// Replaces the flat discount. Re-applying the held amount changes nothing.
    pub fn apply_discount(&mut self, amount: Decimal) -> Result<()> {
        let discount = Money::new(amount)?;
        if discount == self.discount { return Ok(()); }
        self.discount = discount;
        self.touch();
        self.raise_event(CartEvent::DiscountApplied { cart_id: self.id.clone(), amount });
        Ok(())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.discount = Money::ZERO;
        self.touch();
        self.raise_event(CartEvent::Cleared { cart_id: self.id.clone() });
    }

    pub fn subtotal(&self) -> Money { self.lines.iter().map(CartLine::line_subtotal).sum() }

    /// Portion of the held discount that actually applies.
    pub fn effective_discount(&self) -> Money { self.discount.min(self.subtotal()) }

    /// `subtotal - discount`, never below zero.
    pub fn total(&self) -> Money { self.subtotal().saturating_sub(self.discount) }

    pub fn total_item_count(&self) -> u64 { self.lines.iter().map(|l| u64::from(l.quantity.value())).sum() }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: CartEvent) { self.events.push(DomainEvent::Cart(e)); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(id: &str, price: Decimal, qty: u32) -> NewCartLine {
        NewCartLine { product_id: id.into(), name: format!("Product {id}"), brand: None, image_url: None, unit_price: price, quantity: qty }
    }

    #[test]
    fn test_subtotal_is_sum_of_lines() {
        let mut cart = Cart::new();
        cart.add_item(item("A", dec!(100.00), 1)).unwrap();
        cart.add_item(item("B", dec!(12.50), 4)).unwrap();
        cart.add_item(item("C", dec!(0), 2)).unwrap();
        assert_eq!(cart.subtotal().amount(), dec!(150.00));
        assert_eq!(cart.lines().len(), 3);
        assert_eq!(cart.total_item_count(), 7);
    }

    #[test]
    fn test_same_product_merges() {
        let mut cart = Cart::new();
        cart.add_item(item("A", dec!(100.00), 1)).unwrap();
        cart.add_item(item("A", dec!(100.00), 2)).unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.line("A").unwrap().quantity.value(), 3);
        assert_eq!(cart.subtotal().amount(), dec!(300.00));
    }

    #[test]
    fn test_invalid_items_leave_cart_untouched() {
        let mut cart = Cart::new();
        cart.add_item(item("A", dec!(10), 1)).unwrap();
        assert!(matches!(cart.add_item(item("A", dec!(-1), 1)), Err(CommerceError::InvalidArgument(_))));
        assert!(matches!(cart.add_item(item("A", dec!(10), 0)), Err(CommerceError::InvalidArgument(_))));
        assert!(cart.add_item(item(" ", dec!(10), 1)).is_err());
        assert_eq!(cart.line("A").unwrap().quantity.value(), 1);
    }

    #[test]
    fn test_update_to_zero_removes_line() {
        let mut cart = Cart::new();
        cart.add_item(item("A", dec!(10), 2)).unwrap();
        cart.add_item(item("B", dec!(5), 3)).unwrap();
        cart.update_quantity("A", 0);
        assert!(cart.line("A").is_none());
        assert_eq!(cart.subtotal().amount(), dec!(15));
        assert_eq!(cart.total_item_count(), 3);
    }

    #[test]
    fn test_unknown_product_is_noop() {
        let mut cart = Cart::new();
        cart.add_item(item("A", dec!(10), 2)).unwrap();
        cart.take_events();
        cart.update_quantity("missing", 5);
        assert!(!cart.remove_item("missing"));
        assert!(cart.take_events().is_empty());
        cart.update_quantity("A", 5);
        assert_eq!(cart.subtotal().amount(), dec!(50));
        assert!(cart.remove_item("A"));
        assert!(!cart.remove_item("A"));
    }

    #[test]
    fn test_discount_replaces() {
        let mut cart = Cart::new();
        cart.add_item(item("A", dec!(100), 3)).unwrap();
        cart.apply_discount(dec!(10)).unwrap();
        cart.apply_discount(dec!(5)).unwrap();
        assert_eq!(cart.discount().amount(), dec!(5));
        cart.apply_discount(dec!(50)).unwrap();
        assert_eq!(cart.total().amount(), dec!(250.00));
        assert!(cart.apply_discount(dec!(-1)).is_err());
        assert_eq!(cart.discount().amount(), dec!(50));
    }

    #[test]
    fn test_same_discount_raises_nothing() {
        let mut cart = Cart::new();
        cart.apply_discount(dec!(0)).unwrap();
        assert!(cart.take_events().is_empty());
        cart.apply_discount(dec!(15)).unwrap();
        assert_eq!(cart.take_events().len(), 1);
        cart.apply_discount(dec!(15.00)).unwrap();
        assert!(cart.take_events().is_empty());
        assert_eq!(cart.discount().amount(), dec!(15));
    }

    #[test]
    fn test_total_clamps_at_zero() {
        let mut cart = Cart::new();
        cart.add_item(item("A", dec!(50), 1)).unwrap();
        cart.apply_discount(dec!(50)).unwrap();
        assert_eq!(cart.total(), Money::ZERO);
        cart.apply_discount(dec!(80)).unwrap();
        assert_eq!(cart.total(), Money::ZERO);
        assert_eq!(cart.effective_discount().amount(), dec!(50));
        cart.apply_discount(dec!(20)).unwrap();
        assert_eq!(cart.total().amount(), cart.subtotal().amount() - cart.discount().amount());
    }

    #[test]
    fn test_clear_resets_discount() {
        let mut cart = Cart::new();
        cart.add_item(item("A", dec!(50), 1)).unwrap();
        cart.apply_discount(dec!(5)).unwrap();
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.discount(), Money::ZERO);
        assert_eq!(cart.total(), Money::ZERO);
        assert!(matches!(cart.take_events().last(), Some(DomainEvent::Cart(CartEvent::Cleared { .. }))));
    }
}
