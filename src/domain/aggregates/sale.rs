//! Sale Aggregate
//!
//! Holds what a finished checkout sold: lines with optional per-line discounts,
//! sale-wide discounts, payments, and how many units of each line have been
//! returned so far. The numbers fed to the refund calculator come from here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::aggregates::cart::Cart;
use crate::domain::aggregates::credit::StoreCredit;
use crate::domain::events::{DomainEvent, SaleEvent};
use crate::domain::refund::{calculate_refund, DiscountBasis, RefundBreakdown, ReturnRequest, ReturnedLine};
use crate::domain::value_objects::{Discount, Money, Quantity};
use crate::{CommerceError, Result};

#[derive(Clone, Debug, Serialize)]
pub struct Sale {
    id: String,
    number: u64,
    customer_id: Option<String>,
    kind: SaleKind,
    status: SaleStatus,
    lines: Vec<SaleLine>,
    discounts: Vec<Discount>,
    payments: Vec<Payment>,
    devolutions: Vec<Devolution>,
    /// Discount kept back by the returns registered so far.
    discount_withheld: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SaleLine {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub discount: Option<Discount>,
    pub returned: u32,
}

impl SaleLine {
    pub fn gross(&self) -> Money { self.unit_price.times(self.quantity) }
    pub fn discount_amount(&self) -> Money { self.discount.map(|d| d.resolve(self.gross())).unwrap_or(Money::ZERO) }
    pub fn remaining_returnable(&self) -> u32 { self.quantity.value().saturating_sub(self.returned) }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SaleLineInput {
    pub product_id: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub discount: Option<Discount>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleKind {
    #[default]
    Normal,
    /// Paid later; balance may stay open after completion.
    OnAccount,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus { #[default] InProgress, Completed, Cancelled, Returned }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod { Cash, Pix, CreditCard, DebitCard, BankTransfer, Boleto, StoreCredit }

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Payment { pub method: PaymentMethod, pub amount: Money, pub received_at: DateTime<Utc> }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnItem { pub line_id: String, pub quantity: u32 }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    /// Refund becomes store credit for the sale's customer.
    StoreCredit,
    /// Money goes back; no credit is issued.
    Refund,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Devolution {
    pub id: String,
    pub kind: ReturnKind,
    pub reason: String,
    pub items: Vec<ReturnItem>,
    pub refund: RefundBreakdown,
    pub credit: Option<StoreCredit>,
    pub registered_at: DateTime<Utc>,
}

impl Sale {
    pub fn open(number: u64, customer_id: Option<String>, kind: SaleKind) -> Self {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut sale = Self {
            id: id.clone(), number, customer_id, kind, status: SaleStatus::InProgress,
            lines: vec![], discounts: vec![], payments: vec![], devolutions: vec![],
            discount_withheld: Money::ZERO, created_at: now, updated_at: now, events: vec![],
        };
        sale.raise_event(SaleEvent::Opened { sale_id: id, number });
        sale
    }

    /// Turns a checked-out cart into a sale; the cart's discount becomes a flat sale discount.
    pub fn from_cart(cart: &Cart, number: u64, customer_id: Option<String>) -> Result<Self> {
        if cart.is_empty() { return Err(CommerceError::EmptyCart); }
        let mut sale = Self::open(number, customer_id, SaleKind::Normal);
        for line in cart.lines() {
            sale.add_line(SaleLineInput {
                product_id: line.product_id.clone(), name: line.name.clone(),
                unit_price: line.unit_price.amount(), quantity: line.quantity.value(), discount: None,
            })?;
        }
        let discount = cart.effective_discount();
        if !discount.is_zero() { sale.apply_discount(Discount::Amount(discount))?; }
        Ok(sale)
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn number(&self) -> u64 { self.number }
    pub fn customer_id(&self) -> Option<&str> { self.customer_id.as_deref() }
    pub fn kind(&self) -> SaleKind { self.kind }
    pub fn status(&self) -> SaleStatus { self.status }
    pub fn lines(&self) -> &[SaleLine] { &self.lines }
    pub fn payments(&self) -> &[Payment] { &self.payments }
    pub fn devolutions(&self) -> &[Devolution] { &self.devolutions }
    pub fn discount_withheld(&self) -> Money { self.discount_withheld }

    pub fn add_line(&mut self, input: SaleLineInput) -> Result<String> {
        self.ensure_in_progress()?;
        let line = SaleLine {
            id: Uuid::new_v4().to_string(), product_id: input.product_id, name: input.name,
            quantity: Quantity::new(input.quantity)?, unit_price: Money::new(input.unit_price)?,
            discount: input.discount, returned: 0,
        };
        let id = line.id.clone();
        self.lines.push(line);
        self.touch();
        Ok(id)
    }

    /// Adds a sale-wide discount; percentages apply to the gross subtotal.
    pub fn apply_discount(&mut self, discount: Discount) -> Result<()> {
        self.ensure_in_progress()?;
        self.discounts.push(discount);
        self.touch();
        let amount = discount.resolve(self.gross_subtotal()).amount();
        self.raise_event(SaleEvent::DiscountApplied { sale_id: self.id.clone(), amount });
        Ok(())
    }

    pub fn add_payment(&mut self, method: PaymentMethod, amount: Decimal) -> Result<()> {
        if self.status == SaleStatus::Cancelled { return Err(CommerceError::invalid("sale is cancelled")); }
        let amount = Money::new(amount)?;
        if amount.is_zero() { return Err(CommerceError::invalid("payment must be positive")); }
        self.payments.push(Payment { method, amount, received_at: Utc::now() });
        self.touch();
        self.raise_event(SaleEvent::PaymentReceived { sale_id: self.id.clone(), amount: amount.amount() });
        Ok(())
    }

    pub fn complete(&mut self) -> Result<()> {
        self.ensure_in_progress()?;
        if self.lines.is_empty() { return Err(CommerceError::invalid("sale has no lines")); }
        self.status = SaleStatus::Completed;
        self.touch();
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        if self.status == SaleStatus::Returned { return Err(CommerceError::invalid("returned sale cannot be cancelled")); }
        self.status = SaleStatus::Cancelled;
        self.touch();
        Ok(())
    }

    pub fn gross_subtotal(&self) -> Money { self.lines.iter().map(SaleLine::gross).sum() }
    pub fn line_discount_total(&self) -> Money { self.lines.iter().map(SaleLine::discount_amount).sum() }

    pub fn general_discount_total(&self) -> Money {
        let gross = self.gross_subtotal();
        self.discounts.iter().map(|d| d.resolve(gross)).sum()
    }

    /// Line and sale-wide discounts together, capped at the gross subtotal.
    pub fn discount_total(&self) -> Money {
        (self.line_discount_total() + self.general_discount_total()).min(self.gross_subtotal())
    }

    pub fn total(&self) -> Money { self.gross_subtotal().saturating_sub(self.discount_total()) }
    pub fn amount_paid(&self) -> Money { self.payments.iter().map(|p| p.amount).sum() }
    pub fn balance_due(&self) -> Money { self.total().saturating_sub(self.amount_paid()) }

    pub fn remaining_returnable(&self, line_id: &str) -> Result<u32> {
        self.line(line_id).map(SaleLine::remaining_returnable)
    }

    /// Builds the refund input for `items`, rejecting anything beyond what is still returnable.
    pub fn prepare_return(&self, items: &[ReturnItem]) -> Result<ReturnRequest> {
        let requested = self.merge_return_items(items)?;
        let mut returned_lines = Vec::with_capacity(requested.len());
        for (line_id, quantity) in &requested {
            let line = self.line(line_id)?;
            let remaining = line.remaining_returnable();
            if *quantity > remaining {
                return Err(CommerceError::ReturnExceedsRemaining { line_id: line_id.to_string(), requested: *quantity, remaining });
            }
            returned_lines.push(ReturnedLine { unit_price: line.unit_price, quantity: Quantity::new(*quantity)? });
        }
        ReturnRequest::new(self.total().amount(), self.discount_total().amount(), returned_lines)
    }

    /// Records a return on a completed sale: computes the refund, bumps
    /// returned quantities and, for [`ReturnKind::StoreCredit`], issues credit
    /// to the customer.
    ///
    /// Each return withholds its prorated share of the discount, capped at
    /// what earlier returns left. The return that empties the sale withholds
    /// the whole remainder, so the refunds of a sale add up to its total.
    pub fn register_return(&mut self, items: &[ReturnItem], kind: ReturnKind, basis: DiscountBasis, reason: impl Into<String>) -> Result<Devolution> {
        if self.status != SaleStatus::Completed {
            return Err(CommerceError::invalid("only completed sales can be returned"));
        }
        if kind == ReturnKind::StoreCredit && self.customer_id.is_none() { return Err(CommerceError::MissingCustomer); }

        let request = self.prepare_return(items)?;
        let requested = self.merge_return_items(items)?;
        let closes_sale = self.lines.iter()
            .all(|l| l.remaining_returnable() == requested.get(&l.id).copied().unwrap_or(0));
        let remaining_discount = self.discount_total().saturating_sub(self.discount_withheld);
        let refund = calculate_refund(&request, basis).within_remaining(remaining_discount, closes_sale);
        let reason = reason.into();

        for (line_id, quantity) in requested {
            if let Some(line) = self.lines.iter_mut().find(|l| l.id == line_id) {
                line.returned += quantity;
            }
        }
        self.discount_withheld = self.discount_withheld + refund.proportional_discount;

        let credit = match (kind, self.customer_id.as_deref()) {
            (ReturnKind::StoreCredit, Some(customer)) => {
                Some(StoreCredit::issue(customer, Some(self.id.clone()), refund.refund_total, format!("Return: {reason}")))
            }
            _ => None,
        };
        let devolution = Devolution {
            id: Uuid::new_v4().to_string(), kind, reason, items: items.to_vec(),
            refund, credit: credit.clone(), registered_at: Utc::now(),
        };
        self.devolutions.push(devolution.clone());
        if self.lines.iter().all(|l| l.remaining_returnable() == 0) { self.status = SaleStatus::Returned; }
        self.touch();

        self.raise_event(SaleEvent::Returned {
            sale_id: self.id.clone(), devolution_id: devolution.id.clone(), refund: refund.refund_total.amount(), basis,
        });
        if let Some(credit) = credit {
            self.raise_event(SaleEvent::CreditIssued { sale_id: self.id.clone(), credit_id: credit.id().to_string(), amount: credit.amount().amount() });
        }
        Ok(devolution)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn line(&self, line_id: &str) -> Result<&SaleLine> {
        self.lines.iter().find(|l| l.id == line_id).ok_or_else(|| CommerceError::SaleLineNotFound(line_id.to_string()))
    }

    // Same line listed twice in one return counts once with the summed quantity.
    fn merge_return_items(&self, items: &[ReturnItem]) -> Result<BTreeMap<String, u32>> {
        let mut merged = BTreeMap::new();
        for item in items {
            if item.quantity == 0 { return Err(CommerceError::invalid("return quantity must be at least 1")); }
            self.line(&item.line_id)?;
            *merged.entry(item.line_id.clone()).or_insert(0u32) += item.quantity;
        }
        Ok(merged)
    }

    fn ensure_in_progress(&self) -> Result<()> {
        if self.status != SaleStatus::InProgress { return Err(CommerceError::invalid("sale is not in progress")); }
        Ok(())
    }

    fn raise_event(&mut self, e: SaleEvent) { self.events.push(DomainEvent::Sale(e)); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::cart::NewCartLine;
    use crate::domain::value_objects::Percentage;
    use rust_decimal_macros::dec;

    fn input(product: &str, price: Decimal, qty: u32, discount: Option<Discount>) -> SaleLineInput {
        SaleLineInput { product_id: product.into(), name: product.into(), unit_price: price, quantity: qty, discount }
    }

    fn money(amount: Decimal) -> Money { Money::new(amount).unwrap() }

    /// Gross 200.00, flat discount 20.00, total 180.00.
    fn discounted_sale() -> (Sale, String, String) {
        let mut sale = Sale::open(1001, Some("CUST1".into()), SaleKind::Normal);
        let a = sale.add_line(input("A", dec!(100), 1, None)).unwrap();
        let b = sale.add_line(input("B", dec!(50), 2, None)).unwrap();
        sale.apply_discount(Discount::Amount(money(dec!(20)))).unwrap();
        sale.complete().unwrap();
        (sale, a, b)
    }

    #[test]
    fn test_totals_with_line_and_general_discounts() {
        let mut sale = Sale::open(7, None, SaleKind::OnAccount);
        sale.add_line(input("A", dec!(100), 2, Some(Discount::Percentage(Percentage::new(dec!(10)).unwrap())))).unwrap();
        sale.add_line(input("B", dec!(50), 1, None)).unwrap();
        sale.apply_discount(Discount::Amount(money(dec!(30)))).unwrap();
        assert_eq!(sale.gross_subtotal().amount(), dec!(250));
        assert_eq!(sale.line_discount_total().amount(), dec!(20));
        assert_eq!(sale.general_discount_total().amount(), dec!(30));
        assert_eq!(sale.total().amount(), dec!(200));

        sale.add_payment(PaymentMethod::Pix, dec!(150)).unwrap();
        assert_eq!(sale.balance_due().amount(), dec!(50));
        assert!(sale.add_payment(PaymentMethod::Cash, dec!(0)).is_err());
        sale.complete().unwrap();
        sale.add_payment(PaymentMethod::Cash, dec!(50)).unwrap();
        assert_eq!(sale.balance_due(), Money::ZERO);
    }

    #[test]
    fn test_discounts_cannot_exceed_gross() {
        let mut sale = Sale::open(8, None, SaleKind::Normal);
        sale.add_line(input("A", dec!(40), 1, Some(Discount::Amount(money(dec!(30)))))).unwrap();
        sale.apply_discount(Discount::Percentage(Percentage::new(dec!(50)).unwrap())).unwrap();
        assert_eq!(sale.discount_total().amount(), dec!(40));
        assert_eq!(sale.total(), Money::ZERO);
    }

    #[test]
    fn test_from_cart() {
        let mut cart = Cart::new();
        cart.add_item(NewCartLine { product_id: "A".into(), name: "Case".into(), brand: None, image_url: None, unit_price: dec!(100), quantity: 3 }).unwrap();
        cart.apply_discount(dec!(50)).unwrap();
        let sale = Sale::from_cart(&cart, 42, None).unwrap();
        assert_eq!(sale.number(), 42);
        assert_eq!(sale.lines()[0].quantity.value(), 3);
        assert_eq!(sale.total(), cart.total());
        assert_eq!(sale.discount_total().amount(), dec!(50));

        assert_eq!(Sale::from_cart(&Cart::new(), 43, None).unwrap_err(), CommerceError::EmptyCart);
    }

    #[test]
    fn test_partial_returns_accumulate() {
        let (mut sale, _, b) = discounted_sale();
        let first = sale.register_return(&[ReturnItem { line_id: b.clone(), quantity: 1 }], ReturnKind::Refund, DiscountBasis::PreDiscount, "defect").unwrap();
        assert_eq!(first.refund.refund_total.amount(), dec!(45));
        assert!(first.credit.is_none());
        assert_eq!(sale.remaining_returnable(&b).unwrap(), 1);

        let err = sale.prepare_return(&[ReturnItem { line_id: b.clone(), quantity: 2 }]).unwrap_err();
        assert_eq!(err, CommerceError::ReturnExceedsRemaining { line_id: b.clone(), requested: 2, remaining: 1 });
        assert_eq!(sale.status(), SaleStatus::Completed);
    }

    #[test]
    fn test_duplicate_items_are_summed() {
        let (sale, _, b) = discounted_sale();
        let items = [ReturnItem { line_id: b.clone(), quantity: 2 }, ReturnItem { line_id: b, quantity: 1 }];
        assert!(matches!(sale.prepare_return(&items), Err(CommerceError::ReturnExceedsRemaining { requested: 3, .. })));
    }

    #[test]
    fn test_full_return_with_store_credit() {
        let (mut sale, a, b) = discounted_sale();
        sale.take_events();
        let items = [ReturnItem { line_id: a, quantity: 1 }, ReturnItem { line_id: b, quantity: 2 }];
        let devolution = sale.register_return(&items, ReturnKind::StoreCredit, DiscountBasis::PostDiscount, "changed mind").unwrap();
        assert_eq!(devolution.refund.refund_total.amount(), dec!(180));
        let credit = devolution.credit.unwrap();
        assert_eq!(credit.customer_id(), "CUST1");
        assert_eq!(credit.balance().amount(), dec!(180));
        assert_eq!(sale.status(), SaleStatus::Returned);
        assert_eq!(sale.devolutions().len(), 1);
        assert_eq!(sale.take_events().len(), 2);
        assert!(sale.cancel().is_err());
    }

    #[test]
    fn test_store_credit_needs_customer() {
        let mut sale = Sale::open(9, None, SaleKind::Normal);
        let a = sale.add_line(input("A", dec!(10), 1, None)).unwrap();
        sale.complete().unwrap();
        let err = sale.register_return(&[ReturnItem { line_id: a.clone(), quantity: 1 }], ReturnKind::StoreCredit, DiscountBasis::PreDiscount, "x").unwrap_err();
        assert_eq!(err, CommerceError::MissingCustomer);
        assert_eq!(sale.remaining_returnable(&a).unwrap(), 1);
    }

    #[test]
    fn test_only_completed_sales_accept_returns() {
        let mut sale = Sale::open(10, Some("CUST1".into()), SaleKind::Normal);
        let a = sale.add_line(input("A", dec!(10), 2, None)).unwrap();
        let items = [ReturnItem { line_id: a.clone(), quantity: 1 }];
        let err = sale.register_return(&items, ReturnKind::Refund, DiscountBasis::PreDiscount, "x").unwrap_err();
        assert!(matches!(err, CommerceError::InvalidArgument(_)));
        assert_eq!(sale.remaining_returnable(&a).unwrap(), 2);
        assert!(sale.devolutions().is_empty());

        sale.complete().unwrap();
        sale.cancel().unwrap();
        assert!(sale.register_return(&items, ReturnKind::Refund, DiscountBasis::PreDiscount, "x").is_err());
    }

    #[test]
    fn test_successive_returns_refund_sale_total() {
        for (basis, expected) in [
            (DiscountBasis::PostDiscount, [dec!(44.44), dec!(44.44), dec!(91.12)]),
            (DiscountBasis::PreDiscount, [dec!(45), dec!(45), dec!(90)]),
        ] {
            let (mut sale, a, b) = discounted_sale();
            let refunds: Vec<Decimal> = [&b, &b, &a].into_iter()
                .map(|line| {
                    let items = [ReturnItem { line_id: line.clone(), quantity: 1 }];
                    sale.register_return(&items, ReturnKind::Refund, basis, "defect").unwrap().refund.refund_total.amount()
                })
                .collect();
            assert_eq!(refunds, expected, "basis {basis}");
            assert_eq!(refunds.iter().copied().sum::<Decimal>(), sale.total().amount());
            assert_eq!(sale.discount_withheld(), sale.discount_total());
            assert_eq!(sale.status(), SaleStatus::Returned);
        }
    }

    #[test]
    fn test_unknown_line_and_zero_quantity() {
        let (sale, a, _) = discounted_sale();
        assert_eq!(sale.prepare_return(&[ReturnItem { line_id: "nope".into(), quantity: 1 }]).unwrap_err(), CommerceError::SaleLineNotFound("nope".into()));
        assert!(matches!(sale.prepare_return(&[ReturnItem { line_id: a, quantity: 0 }]), Err(CommerceError::InvalidArgument(_))));
    }

    #[test]
    fn test_completed_sale_is_frozen() {
        let (mut sale, _, _) = discounted_sale();
        assert!(sale.add_line(input("C", dec!(1), 1, None)).is_err());
        assert!(sale.apply_discount(Discount::Amount(Money::ZERO)).is_err());
    }
}
