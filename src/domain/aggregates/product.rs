//! Catalog product as seen by the storefront

use serde::{Deserialize, Serialize};

use crate::domain::aggregates::cart::NewCartLine;
use crate::domain::value_objects::Money;
use crate::{CommerceError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: String,
    pub name: String,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub unit_price: Money,
    #[serde(default)]
    pub available_quantity: u32,
}

impl CatalogProduct {
    pub fn is_in_stock(&self) -> bool { self.available_quantity > 0 }

    /// Fails when `requested` units exceed what is on hand.
    pub fn ensure_available(&self, requested: u32) -> Result<()> {
        if requested > self.available_quantity {
            return Err(CommerceError::InsufficientStock {
                product_id: self.id.clone(), requested, available: self.available_quantity,
            });
        }
        Ok(())
    }

    pub fn to_cart_line(&self, quantity: u32) -> NewCartLine {
        NewCartLine {
            product_id: self.id.clone(), name: self.name.clone(), brand: self.brand.clone(),
            image_url: self.image_url.clone(), unit_price: self.unit_price.amount(), quantity,
        }
    }
}
