//! Environment configuration

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::refund::DiscountBasis;

const DEFAULT_PORT: u16 = 8083;

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub port: u16,
    pub refund_basis: DiscountBasis,
    pub catalog_path: Option<PathBuf>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid PORT '{0}'")]
    InvalidPort(String),

    #[error("Invalid REFUND_DISCOUNT_BASIS '{0}', expected pre_discount or post_discount")]
    InvalidRefundBasis(String),
}

impl Default for Config {
    fn default() -> Self {
        Self { port: DEFAULT_PORT, refund_basis: DiscountBasis::default(), catalog_path: None }
    }
}

impl Config {
    /// Reads `PORT`, `REFUND_DISCOUNT_BASIS` and `CATALOG_PATH` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(port) = lookup("PORT") {
            config.port = port.trim().parse().map_err(|_| ConfigError::InvalidPort(port))?;
        }
        if let Some(basis) = lookup("REFUND_DISCOUNT_BASIS") {
            config.refund_basis = basis.parse().map_err(|_| ConfigError::InvalidRefundBasis(basis))?;
        }
        config.catalog_path = lookup("CATALOG_PATH").filter(|p| !p.trim().is_empty()).map(PathBuf::from);
        Ok(config)
    }
}
