//! Aggregates module
pub mod cart;
pub mod credit;
pub mod product;
pub mod sale;

pub use cart::{Cart, CartLine, NewCartLine};
pub use credit::StoreCredit;
pub use product::CatalogProduct;
pub use sale::{Devolution, PaymentMethod, ReturnItem, ReturnKind, Sale, SaleKind, SaleLineInput, SaleStatus};
