//! Integration tests for the shared price cache

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tickwire::cache::{PriceCache, ResourceError};

fn symbols() -> Vec<String> {
    vec!["AAPL".to_string(), "MSFT".to_string()]
}

#[test]
fn test_updates_visible_to_every_handle() {
    let dir = tempfile::tempdir().unwrap();
    let mut owner = PriceCache::create(dir.path(), &symbols()).unwrap();
    let writer = PriceCache::attach(dir.path(), owner.name(), &symbols()).unwrap();
    let reader = PriceCache::attach(dir.path(), owner.name(), &symbols()).unwrap();

    assert_eq!(reader.read("AAPL").unwrap(), None);
    for i in 0..100 {
        let price = 100.0 + f64::from(i) * 0.25;
        writer.update("AAPL", price).unwrap();
        assert_eq!(reader.read("AAPL").unwrap(), Some(price));
        assert_eq!(owner.read("AAPL").unwrap(), Some(price));
    }

    reader.close();
    writer.close();
    owner.destroy().unwrap();
}

#[test]
fn test_attach_does_not_reset_values() {
    let dir = tempfile::tempdir().unwrap();
    let mut owner = PriceCache::create(dir.path(), &symbols()).unwrap();
    owner.update("MSFT", 321.0).unwrap();

    let late = PriceCache::attach(dir.path(), owner.name(), &symbols()).unwrap();
    assert_eq!(late.read("MSFT").unwrap(), Some(321.0));
    assert_eq!(late.snapshot().get("MSFT"), Some(321.0));
    owner.destroy().unwrap();
}

#[test]
fn test_no_torn_reads() {
    let dir = tempfile::tempdir().unwrap();
    let mut owner = PriceCache::create(dir.path(), &symbols()).unwrap();
    let a = f64::from_bits(0x0000_0000_0000_0001);
    let b = f64::from_bits(0x7FEF_FFFF_FFFF_FFFF);
    owner.update("AAPL", a).unwrap();

    let name = owner.name().to_string();
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let dir = dir.path().to_path_buf();
        let name = name.clone();
        let done = done.clone();
        thread::spawn(move || {
            let cache = PriceCache::attach(&dir, &name, &symbols()).unwrap();
            for i in 0..200_000 {
                cache.update("AAPL", if i % 2 == 0 { b } else { a }).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let reader = PriceCache::attach(dir.path(), &name, &symbols()).unwrap();
    let mut reads = 0u64;
    while !done.load(Ordering::SeqCst) {
        let bits = reader.read("AAPL").unwrap().unwrap().to_bits();
        assert!(bits == a.to_bits() || bits == b.to_bits(), "torn value {bits:#x}");
        reads += 1;
    }
    writer.join().unwrap();
    assert!(reads > 0);
    owner.destroy().unwrap();
}

#[test]
fn test_consistent_snapshots_never_mix_writes() {
    let dir = tempfile::tempdir().unwrap();
    let mut owner = PriceCache::create(dir.path(), &symbols()).unwrap();
    owner.update("AAPL", 0.0).unwrap();
    owner.update("MSFT", 0.0).unwrap();

    let name = owner.name().to_string();
    let done = Arc::new(AtomicBool::new(false));
    let writer = {
        let dir = dir.path().to_path_buf();
        let name = name.clone();
        let done = done.clone();
        thread::spawn(move || {
            let cache = PriceCache::attach(&dir, &name, &symbols()).unwrap();
            for i in 1..=50_000 {
                let v = f64::from(i);
                cache.update("AAPL", v).unwrap();
                cache.update("MSFT", v).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let reader = PriceCache::attach(dir.path(), &name, &symbols()).unwrap();
    let mut consistent = 0u64;
    while !done.load(Ordering::SeqCst) {
        let snap = reader.snapshot();
        if !snap.is_consistent() {
            continue;
        }
        consistent += 1;
        let (a, m) = (snap.get("AAPL").unwrap(), snap.get("MSFT").unwrap());
        let gap = a - m;
        assert!(gap == 0.0 || gap == 1.0, "AAPL {a} MSFT {m}");
        assert_eq!(snap.version() % 2, 0);
    }
    writer.join().unwrap();
    assert!(consistent > 0 || reader.snapshot().is_consistent());
    owner.destroy().unwrap();
}

#[test]
fn test_only_creator_destroys_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut owner = PriceCache::create(dir.path(), &symbols()).unwrap();
    let mut other = PriceCache::attach(dir.path(), owner.name(), &symbols()).unwrap();

    assert!(matches!(other.destroy(), Err(ResourceError::NotCreator(_))));
    owner.destroy().unwrap();
    assert!(matches!(owner.destroy(), Err(ResourceError::AlreadyReleased(_))));

    // Existing mappings survive; new attaches fail.
    other.update("AAPL", 5.0).unwrap();
    assert_eq!(other.read("AAPL").unwrap(), Some(5.0));
    assert!(matches!(
        PriceCache::attach(dir.path(), owner.name(), &symbols()),
        Err(ResourceError::NotFound(_))
    ));
}
