use graft_ir::{Pattern, PatternBuilder};

use crate::artifacts::{ArtifactStore, DirStore, MemoryStore, PatternCache};

fn relu() -> Pattern {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let root = p.node("Relu", [x]);
    p.build(root)
}

fn neg() -> Pattern {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let root = p.node("Neg", [x]);
    p.build(root)
}

#[test]
fn test_memory_store() {
    let mut store = MemoryStore::new();
    assert_eq!(store.read_file("a/b").unwrap(), None);
    store.write_file("a/b", b"blob").unwrap();
    assert_eq!(store.read_file("a/b").unwrap().as_deref(), Some(&b"blob"[..]));
    assert_eq!(store.paths().collect::<Vec<_>>(), ["a/b"]);
}

#[test]
fn test_dir_store_creates_subdirectories() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = DirStore::new(dir.path());
    assert_eq!(store.read_file("patterns/x.cbor").unwrap(), None);

    store.write_file("patterns/x.cbor", &[1, 2, 3]).unwrap();
    assert!(dir.path().join("patterns").join("x.cbor").is_file());
    assert_eq!(store.read_file("patterns/x.cbor").unwrap(), Some(vec![1, 2, 3]));
}

fn relu_blob() -> String {
    PatternCache::blob_path("p.relu", relu().fingerprint().unwrap())
}

#[test]
fn test_pattern_cache_compiles_once() {
    let mut store = MemoryStore::new();
    let mut cache = PatternCache::new();

    let first = cache.get_or_compile(&mut store, "p.relu", relu).unwrap();
    assert_eq!((cache.stored(), cache.loaded()), (1, 0));
    assert_eq!(store.paths().collect::<Vec<_>>(), [relu_blob()]);

    let again = cache.get_or_compile(&mut store, "p.relu", || panic!("memoized pattern recompiled")).unwrap();
    assert_eq!(again.fingerprint().unwrap(), first.fingerprint().unwrap());
    assert_eq!((cache.stored(), cache.loaded()), (1, 0));
}

#[test]
fn test_pattern_cache_loads_from_store() {
    let mut store = MemoryStore::new();
    let compiled = PatternCache::new().get_or_compile(&mut store, "p.relu", relu).unwrap();

    let mut cache = PatternCache::new();
    let loaded = cache.get_or_compile(&mut store, "p.relu", relu).unwrap();
    assert_eq!(loaded.fingerprint().unwrap(), compiled.fingerprint().unwrap());
    assert_eq!((cache.stored(), cache.loaded()), (0, 1));
}

#[test]
fn test_pattern_cache_ignores_blob_of_changed_pattern() {
    let mut store = MemoryStore::new();
    PatternCache::new().get_or_compile(&mut store, "p.rule", relu).unwrap();

    let mut cache = PatternCache::new();
    let pattern = cache.get_or_compile(&mut store, "p.rule", neg).unwrap();
    assert_eq!(pattern.fingerprint().unwrap(), neg().fingerprint().unwrap());
    assert_eq!((cache.stored(), cache.loaded()), (1, 0));
    assert_eq!(store.paths().count(), 2);
}

#[test]
fn test_pattern_cache_shares_by_fingerprint() {
    let mut store = MemoryStore::new();
    let mut cache = PatternCache::new();
    cache.get_or_compile(&mut store, "a.relu", relu).unwrap();
    cache.get_or_compile(&mut store, "b.relu", relu).unwrap();
    assert_eq!(cache.len(), 1);
    cache.get_or_compile(&mut store, "c.neg", neg).unwrap();
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.stored(), 3);
}

#[test]
fn test_pattern_cache_replaces_unreadable_blob() {
    let mut store = MemoryStore::new();
    store.write_file(&relu_blob(), b"not cbor").unwrap();

    let mut cache = PatternCache::new();
    let pattern = cache.get_or_compile(&mut store, "p.relu", relu).unwrap();
    assert_eq!(pattern.fingerprint().unwrap(), relu().fingerprint().unwrap());
    assert_eq!((cache.stored(), cache.loaded()), (1, 0));

    let stored = store.read_file(&relu_blob()).unwrap().unwrap();
    assert_eq!(Pattern::from_binary(&stored).unwrap().fingerprint().unwrap(), relu().fingerprint().unwrap());
}

#[test]
fn test_pattern_cache_replaces_blob_with_foreign_fingerprint() {
    let mut store = MemoryStore::new();
    store.write_file(&relu_blob(), &neg().to_binary().unwrap()).unwrap();

    let mut cache = PatternCache::new();
    cache.get_or_compile(&mut store, "p.relu", relu).unwrap();
    assert_eq!((cache.stored(), cache.loaded()), (1, 0));
    let stored = store.read_file(&relu_blob()).unwrap().unwrap();
    assert_eq!(Pattern::from_binary(&stored).unwrap().fingerprint().unwrap(), relu().fingerprint().unwrap());
}
