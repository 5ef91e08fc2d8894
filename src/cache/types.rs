//! Price cache types

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Cache create/attach/destroy misuse
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Filesystem or mapping failure
    #[error("Failed to {op} region {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    /// A region with this name already exists
    #[error("Region already exists: {0}")]
    AlreadyExists(String),
    /// No region with this name exists
    #[error("Region not found: {0}")]
    NotFound(String),
    /// Region name is not usable as a file name
    #[error("Invalid region name: {0:?}")]
    InvalidName(String),
    /// Symbol set is empty, duplicated, or has an unusable entry
    #[error("Invalid symbol set: {0}")]
    InvalidSymbols(String),
    /// Attached region does not match the expected layout or symbols
    #[error("Region layout mismatch: {0}")]
    LayoutMismatch(String),
    /// Symbol is not part of this cache
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
    /// Only the creating handle may destroy the region
    #[error("Handle for {0} is not the creator")]
    NotCreator(String),
    /// Region has already been destroyed
    #[error("Region already released: {0}")]
    AlreadyReleased(String),
}

/// Copy of every cache slot taken at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    symbols: Arc<[String]>,
    prices: Vec<f64>,
    version: u64,
    consistent: bool,
}

impl PriceSnapshot {
    /// Build a snapshot from explicit values (unset slots are NaN)
    pub fn new(symbols: Arc<[String]>, prices: Vec<f64>) -> Self {
        Self::with_version(symbols, prices, 0, true)
    }

    pub(crate) fn with_version(
        symbols: Arc<[String]>,
        prices: Vec<f64>,
        version: u64,
        consistent: bool,
    ) -> Self {
        debug_assert_eq!(symbols.len(), prices.len());
        Self {
            symbols,
            prices,
            version,
            consistent,
        }
    }

    /// Price for a symbol, `None` when unknown or never set
    pub fn get(&self, symbol: &str) -> Option<f64> {
        let idx = self.symbols.iter().position(|s| s == symbol)?;
        let price = self.prices[idx];
        (!price.is_nan()).then_some(price)
    }

    /// `(symbol, price)` pairs in region order; unset slots are NaN
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.symbols
            .iter()
            .map(String::as_str)
            .zip(self.prices.iter().copied())
    }

    /// Symbols in region order
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Write sequence observed while copying
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether no write overlapped the copy
    pub fn is_consistent(&self) -> bool {
        self.consistent
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
