//! HTTP surface: cart sessions, checkout and refund quotes

pub mod cart;
pub mod returns;

use axum::{http::StatusCode, routing::{get, post, put}, Json, Router};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::domain::events::DomainEvent;
use crate::domain::refund::DiscountBasis;
use crate::store::{CartStore, ProductCatalog};
use crate::CommerceError;

#[derive(Clone)]
pub struct AppState {
    pub carts: Arc<dyn CartStore>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub refund_basis: DiscountBasis,
    next_sale_number: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(carts: Arc<dyn CartStore>, catalog: Arc<dyn ProductCatalog>, refund_basis: DiscountBasis) -> Self {
        Self { carts, catalog, refund_basis, next_sale_number: Arc::new(AtomicU64::new(1)) }
    }

    fn next_sale_number(&self) -> u64 { self.next_sale_number.fetch_add(1, Ordering::Relaxed) }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "logcell-commerce"})) }))
        .route("/api/v1/cart/:session", get(cart::get_cart).delete(cart::clear_cart))
        .route("/api/v1/cart/:session/items", post(cart::add_item))
        .route("/api/v1/cart/:session/items/:product_id", put(cart::update_quantity).delete(cart::remove_item))
        .route("/api/v1/cart/:session/discount", put(cart::apply_discount))
        .route("/api/v1/cart/:session/checkout", post(cart::checkout))
        .route("/api/v1/returns/quote", post(returns::quote))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}

pub(crate) type ApiError = (StatusCode, String);

pub(crate) fn reject(e: CommerceError) -> ApiError {
    let status = match &e {
        CommerceError::InvalidArgument(_)
        | CommerceError::SaleLineNotFound(_)
        | CommerceError::ReturnExceedsRemaining { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        CommerceError::ProductNotFound(_) => StatusCode::NOT_FOUND,
        CommerceError::InsufficientStock { .. }
        | CommerceError::EmptyCart
        | CommerceError::MissingCustomer
        | CommerceError::InsufficientCredit { .. } => StatusCode::CONFLICT,
    };
    tracing::warn!(error = %e, status = status.as_u16(), "request rejected");
    (status, e.to_string())
}

pub(crate) fn invalid_request(e: validator::ValidationErrors) -> ApiError {
    tracing::warn!(error = %e, "request failed validation");
    (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
}

pub(crate) fn log_events(events: Vec<DomainEvent>) {
    for event in events {
        tracing::debug!(?event, "domain event");
    }
}
