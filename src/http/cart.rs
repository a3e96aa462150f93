//! Cart session handlers

use axum::{extract::{Path, State}, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{invalid_request, log_events, reject, ApiError, AppState};
use crate::domain::aggregates::{Cart, CartLine, Sale};
use crate::domain::value_objects::{Discount, Money};
use crate::CommerceError;

#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub product_id: String,
    pub name: String,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_subtotal: Money,
}

impl From<&CartLine> for CartLineView {
    fn from(l: &CartLine) -> Self {
        Self {
            product_id: l.product_id.clone(), name: l.name.clone(), brand: l.brand.clone(), image_url: l.image_url.clone(),
            unit_price: l.unit_price, quantity: l.quantity.value(), line_subtotal: l.line_subtotal(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub cart_id: String,
    pub lines: Vec<CartLineView>,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub total_items: u64,
}

impl From<&Cart> for CartView {
    fn from(c: &Cart) -> Self {
        Self {
            cart_id: c.id().to_string(), lines: c.lines().iter().map(CartLineView::from).collect(),
            subtotal: c.subtotal(), discount: c.discount(), total: c.total(), total_items: c.total_item_count(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutView {
    pub sale_id: String,
    pub sale_number: u64,
    pub gross_subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub total_items: u64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    #[validate(length(min = 1, max = 64))]
    pub product_id: String,
    #[validate(range(min = 1, max = 999))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest { pub quantity: i64 }

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 64))]
    pub customer_id: Option<String>,
}

/// Applies `f` to the session's cart through the store, which serializes
/// concurrent requests on the same session.
fn commit(s: &AppState, session: &str, f: &mut dyn FnMut(&mut Cart) -> crate::Result<()>) -> Result<CartView, ApiError> {
    let (cart, events) = s.carts.update(session, f).map_err(reject)?;
    log_events(events);
    Ok(CartView::from(&cart))
}

pub async fn get_cart(State(s): State<AppState>, Path(session): Path<String>) -> Json<CartView> {
    Json(CartView::from(&s.carts.load_or_new(&session)))
}

pub async fn add_item(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<AddItemRequest>) -> Result<(StatusCode, Json<CartView>), ApiError> {
    r.validate().map_err(invalid_request)?;
    let product = s.catalog.find(&r.product_id).ok_or_else(|| reject(CommerceError::ProductNotFound(r.product_id.clone())))?;
    let view = commit(&s, &session, &mut |cart: &mut Cart| {
        let in_cart = cart.line(&product.id).map(|l| l.quantity.value()).unwrap_or(0);
        product.ensure_available(in_cart.saturating_add(r.quantity))?;
        cart.add_item(product.to_cart_line(r.quantity))
    })?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Zero or negative quantities remove the line.
pub async fn update_quantity(State(s): State<AppState>, Path((session, product_id)): Path<(String, String)>, Json(r): Json<UpdateQuantityRequest>) -> Result<Json<CartView>, ApiError> {
    let quantity = u32::try_from(r.quantity.max(0)).unwrap_or(u32::MAX);
    if quantity > 0 {
        if let Some(product) = s.catalog.find(&product_id) {
            product.ensure_available(quantity).map_err(reject)?;
        }
    }
    let view = commit(&s, &session, &mut |cart: &mut Cart| {
        cart.update_quantity(&product_id, quantity);
        Ok(())
    })?;
    Ok(Json(view))
}

pub async fn remove_item(State(s): State<AppState>, Path((session, product_id)): Path<(String, String)>) -> Result<Json<CartView>, ApiError> {
    let view = commit(&s, &session, &mut |cart: &mut Cart| {
        if !cart.remove_item(&product_id) {
            tracing::debug!(%session, %product_id, "remove of product not in cart ignored");
        }
        Ok(())
    })?;
    Ok(Json(view))
}

/// Percentage coupons are resolved against the subtotal at the time they are
/// applied and held as that flat amount; later changes to the cart do not
/// rescale it.
pub async fn apply_discount(State(s): State<AppState>, Path(session): Path<String>, Json(discount): Json<Discount>) -> Result<Json<CartView>, ApiError> {
    let view = commit(&s, &session, &mut |cart: &mut Cart| {
        let amount: Decimal = discount.resolve(cart.subtotal()).amount();
        cart.apply_discount(amount)
    })?;
    Ok(Json(view))
}

pub async fn clear_cart(State(s): State<AppState>, Path(session): Path<String>) -> StatusCode {
    if let Some(mut cart) = s.carts.remove(&session) {
        cart.clear();
        log_events(cart.take_events());
    }
    StatusCode::NO_CONTENT
}

/// Takes the cart out of the store before building the sale, so two checkouts
/// of one session cannot both succeed.
pub async fn checkout(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<CheckoutRequest>) -> Result<(StatusCode, Json<CheckoutView>), ApiError> {
    r.validate().map_err(invalid_request)?;
    let cart = s.carts.remove(&session).ok_or_else(|| reject(CommerceError::EmptyCart))?;
    let mut sale = Sale::from_cart(&cart, s.next_sale_number(), r.customer_id).map_err(reject)?;
    sale.complete().map_err(reject)?;
    log_events(sale.take_events());
    tracing::info!(sale_id = sale.id(), number = sale.number(), total = %sale.total(), "checkout completed");
    Ok((StatusCode::CREATED, Json(CheckoutView {
        sale_id: sale.id().to_string(), sale_number: sale.number(), gross_subtotal: sale.gross_subtotal(),
        discount: sale.discount_total(), total: sale.total(), total_items: cart.total_item_count(),
    })))
}
