//! Shared price cache
//!
//! Fixed, symbol-indexed array of `f64` prices in a memory-mapped file that
//! independent processes attach to by name. Single writer per slot write
//! (guarded by a lock word in the region), lock-free readers.

mod region;
mod types;

pub use region::{PriceCache, MAX_SYMBOL_LEN};
pub use types::{PriceSnapshot, ResourceError};
