//! Refund quotes for returns registered by the back office

use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{invalid_request, reject, ApiError, AppState};
use crate::domain::refund::{calculate_refund, DiscountBasis, RefundBreakdown, ReturnRequest, ReturnedLine};

#[derive(Debug, Serialize, Deserialize)]
pub struct QuoteLine {
    pub unit_price: Decimal,
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReturnQuoteRequest {
    pub original_sale_total: Decimal,
    #[serde(default)]
    pub original_sale_discount: Decimal,
    #[validate(length(min = 1, max = 500))]
    pub lines: Vec<QuoteLine>,
    /// Falls back to the configured basis.
    pub basis: Option<DiscountBasis>,
}

pub async fn quote(State(s): State<AppState>, Json(r): Json<ReturnQuoteRequest>) -> Result<Json<RefundBreakdown>, ApiError> {
    r.validate().map_err(invalid_request)?;
    let lines = r.lines.iter()
        .map(|l| ReturnedLine::new(l.unit_price, l.quantity))
        .collect::<crate::Result<Vec<_>>>()
        .map_err(reject)?;
    let request = ReturnRequest::new(r.original_sale_total, r.original_sale_discount, lines).map_err(reject)?;
    let breakdown = calculate_refund(&request, r.basis.unwrap_or(s.refund_basis));
    tracing::info!(refund = %breakdown.refund_total, basis = %breakdown.basis, "refund quoted");
    Ok(Json(breakdown))
}
