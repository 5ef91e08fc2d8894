//! Memory-mapped price region
//!
//! Layout (native endian, every field 8-byte aligned):
//!
//! ```text
//! 0   magic        u64
//! 8   symbol count u64
//! 16  write lock   u64   0 = free, otherwise holder pid
//! 24  sequence     u64   odd while a write is in flight
//! 32  reserved
//! 64  symbol table count * 16 bytes, zero padded UTF-8
//! ..  price slots  count * u64 (f64 bits, NaN = unset)
//! ```

use super::types::{PriceSnapshot, ResourceError};
use crate::telemetry::{increment, Counter};
use memmap2::MmapMut;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{fence, AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

const MAGIC: u64 = u64::from_le_bytes(*b"TWPRICE1");
const MAGIC_OFF: usize = 0;
const COUNT_OFF: usize = 8;
const LOCK_OFF: usize = 16;
const SEQ_OFF: usize = 24;
const HEADER_LEN: usize = 64;

/// Maximum encoded symbol length in bytes
pub const MAX_SYMBOL_LEN: usize = 16;

/// Copy attempts before a snapshot is returned as inconsistent
const SNAPSHOT_ATTEMPTS: usize = 16;

/// Handle to a symbol-indexed price region shared across processes
///
/// One process creates the region and later destroys it; any number of
/// processes attach by name. Slots are single `AtomicU64`s holding `f64`
/// bits, so readers never observe a torn value.
pub struct PriceCache {
    name: String,
    path: PathBuf,
    map: MmapMut,
    symbols: Arc<[String]>,
    index: HashMap<String, usize>,
    creator: bool,
    released: bool,
}

impl PriceCache {
    /// Create a region with a generated name
    pub fn create(dir: impl AsRef<Path>, symbols: &[String]) -> Result<Self, ResourceError> {
        let simple = Uuid::new_v4().simple().to_string();
        let name = format!("pricebook-{}", &simple[..8]);
        Self::create_named(dir, &name, symbols)
    }

    /// Create a region under a caller-chosen name
    ///
    /// Every slot starts unset (NaN). Fails if the name is taken.
    pub fn create_named(
        dir: impl AsRef<Path>,
        name: &str,
        symbols: &[String],
    ) -> Result<Self, ResourceError> {
        validate_name(name)?;
        validate_symbols(symbols)?;
        let path = dir.as_ref().join(name);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| match source.kind() {
                ErrorKind::AlreadyExists => ResourceError::AlreadyExists(name.to_string()),
                _ => io_error("create", &path, source),
            })?;
        let pending = Unlink::new(&path);
        file.set_len(region_len(symbols.len()) as u64)
            .map_err(|source| io_error("size", &path, source))?;
        let mut map = map_file(&file, &path)?;
        pending.disarm();

        let table = &mut map[HEADER_LEN..slots_offset(symbols.len())];
        for (i, symbol) in symbols.iter().enumerate() {
            let start = i * MAX_SYMBOL_LEN;
            table[start..start + symbol.len()].copy_from_slice(symbol.as_bytes());
        }

        let cache = Self::from_parts(name, path, map, symbols, true);
        cache.atomic_at(COUNT_OFF).store(symbols.len() as u64, Ordering::Relaxed);
        cache.atomic_at(SEQ_OFF).store(0, Ordering::Relaxed);
        for i in 0..symbols.len() {
            cache.slot(i).store(f64::NAN.to_bits(), Ordering::Relaxed);
        }
        // Publish only once the table and slots are initialized.
        cache.atomic_at(MAGIC_OFF).store(MAGIC, Ordering::Release);

        tracing::info!(name = %cache.name, path = %cache.path.display(), symbols = symbols.len(), "Created price cache");
        Ok(cache)
    }

    /// Attach to an existing region without touching its values
    ///
    /// The symbol list must match the creator's, in order.
    pub fn attach(
        dir: impl AsRef<Path>,
        name: &str,
        symbols: &[String],
    ) -> Result<Self, ResourceError> {
        validate_name(name)?;
        validate_symbols(symbols)?;
        let path = dir.as_ref().join(name);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound => ResourceError::NotFound(name.to_string()),
                _ => io_error("open", &path, source),
            })?;
        let len = file
            .metadata()
            .map_err(|source| io_error("stat", &path, source))?
            .len() as usize;
        if len != region_len(symbols.len()) {
            return Err(ResourceError::LayoutMismatch(format!(
                "region is {len} bytes, expected {} for {} symbols",
                region_len(symbols.len()),
                symbols.len()
            )));
        }
        let map = map_file(&file, &path)?;
        let cache = Self::from_parts(name, path, map, symbols, false);

        if cache.atomic_at(MAGIC_OFF).load(Ordering::Acquire) != MAGIC {
            return Err(ResourceError::LayoutMismatch(
                "bad magic, region not initialized".into(),
            ));
        }
        let count = cache.atomic_at(COUNT_OFF).load(Ordering::Relaxed) as usize;
        if count != symbols.len() {
            return Err(ResourceError::LayoutMismatch(format!(
                "region holds {count} symbols, expected {}",
                symbols.len()
            )));
        }
        for (i, symbol) in symbols.iter().enumerate() {
            let stored = cache.stored_symbol(i);
            if stored != symbol.as_str() {
                return Err(ResourceError::LayoutMismatch(format!(
                    "slot {i} holds {stored:?}, expected {symbol:?}"
                )));
            }
        }

        tracing::info!(name = %cache.name, "Attached to price cache");
        Ok(cache)
    }

    fn from_parts(
        name: &str,
        path: PathBuf,
        map: MmapMut,
        symbols: &[String],
        creator: bool,
    ) -> Self {
        let index = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        Self {
            name: name.to_string(),
            path,
            map,
            symbols: symbols.to_vec().into(),
            index,
            creator,
            released: false,
        }
    }

    /// Region name other processes attach with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Symbols in slot order
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Whether this handle created the region
    pub fn is_creator(&self) -> bool {
        self.creator
    }

    /// Write one slot under the region's write lock
    pub fn update(&self, symbol: &str, price: f64) -> Result<(), ResourceError> {
        let idx = self.index_of(symbol)?;
        let seq = self.atomic_at(SEQ_OFF);

        let _guard = self.lock();
        seq.fetch_add(1, Ordering::Relaxed);
        fence(Ordering::Release);
        self.slot(idx).store(price.to_bits(), Ordering::Relaxed);
        seq.fetch_add(1, Ordering::Release);

        increment(Counter::CacheUpdates);
        Ok(())
    }

    /// Current price, `None` while the slot is unset
    pub fn read(&self, symbol: &str) -> Result<Option<f64>, ResourceError> {
        let idx = self.index_of(symbol)?;
        let price = f64::from_bits(self.slot(idx).load(Ordering::Acquire));
        Ok((!price.is_nan()).then_some(price))
    }

    /// Copy every slot
    ///
    /// Retries while a write overlaps the copy. If writes keep overlapping,
    /// the last copy is returned with `is_consistent() == false`; each value
    /// in it is still one that was actually written.
    pub fn snapshot(&self) -> PriceSnapshot {
        let seq = self.atomic_at(SEQ_OFF);
        let mut prices = Vec::with_capacity(self.symbols.len());
        let mut version = 0;

        for _ in 0..SNAPSHOT_ATTEMPTS {
            let before = seq.load(Ordering::Acquire);
            if before & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }
            prices.clear();
            prices.extend(
                (0..self.symbols.len()).map(|i| f64::from_bits(self.slot(i).load(Ordering::Relaxed))),
            );
            fence(Ordering::Acquire);
            if seq.load(Ordering::Relaxed) == before {
                return PriceSnapshot::with_version(self.symbols.clone(), prices, before, true);
            }
            version = before;
        }

        if prices.is_empty() {
            prices.extend(
                (0..self.symbols.len()).map(|i| f64::from_bits(self.slot(i).load(Ordering::Acquire))),
            );
        }
        tracing::debug!(name = %self.name, "Snapshot raced with writers");
        PriceSnapshot::with_version(self.symbols.clone(), prices, version, false)
    }

    /// Detach from the region
    ///
    /// A creating handle that was never destroyed releases the region here,
    /// as it does when dropped.
    pub fn close(self) {
        tracing::debug!(name = %self.name, "Detached from price cache");
    }

    /// Release the region; only valid on the creating handle, once
    ///
    /// Mappings held by other handles stay readable until they close.
    pub fn destroy(&mut self) -> Result<(), ResourceError> {
        if !self.creator {
            return Err(ResourceError::NotCreator(self.name.clone()));
        }
        if self.released {
            return Err(ResourceError::AlreadyReleased(self.name.clone()));
        }
        std::fs::remove_file(&self.path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => ResourceError::AlreadyReleased(self.name.clone()),
            _ => io_error("remove", &self.path, source),
        })?;
        self.released = true;
        tracing::info!(name = %self.name, "Destroyed price cache");
        Ok(())
    }

    fn index_of(&self, symbol: &str) -> Result<usize, ResourceError> {
        self.index
            .get(symbol)
            .copied()
            .ok_or_else(|| ResourceError::UnknownSymbol(symbol.to_string()))
    }

    fn lock(&self) -> WriteGuard<'_> {
        let lock = self.atomic_at(LOCK_OFF);
        let owner = u64::from(std::process::id()).max(1);
        let mut spins = 0u32;
        while lock
            .compare_exchange_weak(0, owner, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            spins += 1;
            if spins < 64 {
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
        WriteGuard { lock }
    }

    fn slot(&self, idx: usize) -> &AtomicU64 {
        self.atomic_at(slots_offset(self.symbols.len()) + idx * 8)
    }

    fn atomic_at(&self, offset: usize) -> &AtomicU64 {
        assert!(offset % 8 == 0 && offset + 8 <= self.map.len());
        // SAFETY: the mapping is page aligned and `offset` is an in-bounds
        // multiple of 8. Header fields and slots are only ever accessed
        // through atomics, by every process mapping the region.
        unsafe { &*(self.map.as_ptr().add(offset) as *const AtomicU64) }
    }

    fn stored_symbol(&self, idx: usize) -> &str {
        let start = HEADER_LEN + idx * MAX_SYMBOL_LEN;
        let raw = &self.map[start..start + MAX_SYMBOL_LEN];
        let end = raw.iter().position(|b| *b == 0).unwrap_or(MAX_SYMBOL_LEN);
        std::str::from_utf8(&raw[..end]).unwrap_or("")
    }
}

impl std::fmt::Debug for PriceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceCache")
            .field("name", &self.name)
            .field("symbols", &self.symbols)
            .field("creator", &self.creator)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for PriceCache {
    fn drop(&mut self) {
        if self.creator && !self.released {
            discard(&self.path);
            tracing::info!(name = %self.name, "Released price cache on drop");
        }
    }
}

struct WriteGuard<'a> {
    lock: &'a AtomicU64,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.store(0, Ordering::Release);
    }
}

fn slots_offset(count: usize) -> usize {
    HEADER_LEN + count * MAX_SYMBOL_LEN
}

fn region_len(count: usize) -> usize {
    slots_offset(count) + count * 8
}

fn map_file(file: &File, path: &Path) -> Result<MmapMut, ResourceError> {
    // SAFETY: the file is sized before mapping and never truncated while
    // mapped; concurrent access goes through atomics only.
    unsafe { MmapMut::map_mut(file) }.map_err(|source| io_error("map", path, source))
}

/// Removes a freshly created region file unless disarmed
struct Unlink<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> Unlink<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Unlink<'_> {
    fn drop(&mut self) {
        if self.armed {
            discard(self.path);
        }
    }
}

fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove price region");
        }
    }
}

fn io_error(op: &'static str, path: &Path, source: std::io::Error) -> ResourceError {
    ResourceError::Io {
        op,
        path: path.to_path_buf(),
        source,
    }
}

fn validate_name(name: &str) -> Result<(), ResourceError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.');
    if valid {
        Ok(())
    } else {
        Err(ResourceError::InvalidName(name.to_string()))
    }
}

fn validate_symbols(symbols: &[String]) -> Result<(), ResourceError> {
    if symbols.is_empty() {
        return Err(ResourceError::InvalidSymbols("no symbols".into()));
    }
    for (i, symbol) in symbols.iter().enumerate() {
        if symbol.is_empty() || symbol.len() > MAX_SYMBOL_LEN || symbol.contains('\0') {
            return Err(ResourceError::InvalidSymbols(format!(
                "{symbol:?} must be 1..={MAX_SYMBOL_LEN} bytes"
            )));
        }
        if symbols[..i].contains(symbol) {
            return Err(ResourceError::InvalidSymbols(format!("duplicate {symbol}")));
        }
    }
    Ok(())
}
