//! Storage seams for carts and the product catalog
//!
//! The engine never reaches for storage itself; handlers get a [`CartStore`]
//! and a [`ProductCatalog`] injected through the application state.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::Path;
use thiserror::Error;

use crate::domain::aggregates::{Cart, CatalogProduct};
use crate::domain::events::DomainEvent;

/// Per-session cart persistence.
pub trait CartStore: Send + Sync {
    fn load(&self, session: &str) -> Option<Cart>;
    fn save(&self, session: &str, cart: Cart);
    fn remove(&self, session: &str) -> Option<Cart>;

    /// Runs `f` on the session's cart (a fresh one if absent) as a single
    /// step: no other update of the same session interleaves with it.
    ///
    /// The cart is stored only if `f` succeeds and raised events; an error
    /// leaves the stored cart as it was. Returns the updated cart together
    /// with the events it raised.
    fn update(&self, session: &str, f: &mut dyn FnMut(&mut Cart) -> crate::Result<()>) -> crate::Result<(Cart, Vec<DomainEvent>)>;

    fn load_or_new(&self, session: &str) -> Cart { self.load(session).unwrap_or_default() }
}

/// Read access to products offered by the store.
pub trait ProductCatalog: Send + Sync {
    fn find(&self, product_id: &str) -> Option<CatalogProduct>;
}

#[derive(Default)]
pub struct MemoryCartStore {
    carts: DashMap<String, Cart>,
}

impl MemoryCartStore {
    pub fn new() -> Self { Self::default() }
    pub fn len(&self) -> usize { self.carts.len() }
    pub fn is_empty(&self) -> bool { self.carts.is_empty() }
}

impl CartStore for MemoryCartStore {
    fn load(&self, session: &str) -> Option<Cart> { self.carts.get(session).map(|c| c.value().clone()) }
    fn save(&self, session: &str, cart: Cart) { self.carts.insert(session.to_string(), cart); }
    fn remove(&self, session: &str) -> Option<Cart> { self.carts.remove(session).map(|(_, c)| c) }

    fn update(&self, session: &str, f: &mut dyn FnMut(&mut Cart) -> crate::Result<()>) -> crate::Result<(Cart, Vec<DomainEvent>)> {
        // The entry guard holds the shard lock until it is dropped.
        match self.carts.entry(session.to_string()) {
            Entry::Occupied(mut entry) => {
                let mut cart = entry.get().clone();
                f(&mut cart)?;
                let events = cart.take_events();
                if !events.is_empty() { entry.insert(cart.clone()); }
                Ok((cart, events))
            }
            Entry::Vacant(entry) => {
                let mut cart = Cart::new();
                f(&mut cart)?;
                let events = cart.take_events();
                if !events.is_empty() { entry.insert(cart.clone()); }
                Ok((cart, events))
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum CatalogLoadError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed catalog: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Default)]
pub struct MemoryCatalog {
    products: DashMap<String, CatalogProduct>,
}

impl MemoryCatalog {
    pub fn new() -> Self { Self::default() }

    pub fn with_products(products: impl IntoIterator<Item = CatalogProduct>) -> Self {
        let catalog = Self::new();
        for p in products { catalog.upsert(p); }
        catalog
    }

    /// Seeds the catalog from a JSON array of products.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogLoadError> {
        let raw = std::fs::read_to_string(path)?;
        let products: Vec<CatalogProduct> = serde_json::from_str(&raw)?;
        Ok(Self::with_products(products))
    }

    pub fn upsert(&self, product: CatalogProduct) { self.products.insert(product.id.clone(), product); }
    pub fn len(&self) -> usize { self.products.len() }
    pub fn is_empty(&self) -> bool { self.products.is_empty() }
}

impl ProductCatalog for MemoryCatalog {
    fn find(&self, product_id: &str) -> Option<CatalogProduct> { self.products.get(product_id).map(|p| p.value().clone()) }
}
