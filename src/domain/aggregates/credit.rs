//! Store credit issued to a customer in place of a cash refund

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::Money;
use crate::{CommerceError, Result};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoreCredit {
    id: String,
    customer_id: String,
    origin_sale_id: Option<String>,
    amount: Money,
    used: Money,
    reason: String,
    issued_at: DateTime<Utc>,
}

impl StoreCredit {
    pub fn issue(customer_id: impl Into<String>, origin_sale_id: Option<String>, amount: Money, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(), customer_id: customer_id.into(), origin_sale_id,
            amount, used: Money::ZERO, reason: reason.into(), issued_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn customer_id(&self) -> &str { &self.customer_id }
    pub fn origin_sale_id(&self) -> Option<&str> { self.origin_sale_id.as_deref() }
    pub fn amount(&self) -> Money { self.amount }
    pub fn used(&self) -> Money { self.used }
    pub fn reason(&self) -> &str { &self.reason }
    pub fn balance(&self) -> Money { self.amount.saturating_sub(self.used) }
    pub fn is_exhausted(&self) -> bool { self.balance().is_zero() }

    /// Spends `amount` of the balance, returning what is left.
    pub fn redeem(&mut self, amount: Money) -> Result<Money> {
        let balance = self.balance();
        if amount > balance {
            return Err(CommerceError::InsufficientCredit { balance: balance.amount(), requested: amount.amount() });
        }
        self.used = self.used + amount;
        Ok(self.balance())
    }
}
