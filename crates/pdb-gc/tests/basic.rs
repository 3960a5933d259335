//! End-to-end collection over small object graphs.

use std::collections::BTreeSet;

use pdb_gc::{Collector, CollectorConfig, CycleMetrics};
use pdb_store::{Datum, Pid, Store, StoreConfig};
use tempfile::TempDir;

fn pid(raw: u64) -> Pid {
    Pid::new(raw).unwrap()
}

fn pids(raw: &[u64]) -> BTreeSet<Pid> {
    raw.iter().copied().map(pid).collect()
}

fn open_store(dir: &TempDir) -> Store {
    let store = Store::new(StoreConfig::new(dir.path().join("objects.pdb")));
    store.open().unwrap();
    store
}

fn collect(store: &Store) -> CycleMetrics {
    let mut collector = Collector::new(store.clone(), CollectorConfig::default()).unwrap();
    collector.collect().unwrap()
}

/// 1 -> 2 -> 3, plus a metadata field on 1 naming 4.
fn chain_with_metadata(store: &Store) {
    store.put_field(Pid::ROOT, "child", "2").unwrap();
    store.put_field(Pid::ROOT, "_meta", "4").unwrap();
    store.put_field(pid(2), "child", "3").unwrap();
    store.put_field(pid(3), "name", "leaf").unwrap();
    store.put_field(pid(4), "name", "orphan").unwrap();
}

#[test]
fn test_chain_skips_metadata_reference() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    chain_with_metadata(&store);

    let metrics = collect(&store);

    assert_eq!(metrics.objects_marked, 3);
    assert_eq!(metrics.references_found, 2);
    assert_eq!(store.pids().unwrap(), pids(&[1, 2, 3]));
    assert!(store.record(pid(4)).unwrap().is_empty());
    // Metadata fields are copied, not followed.
    assert_eq!(
        store.get_field(Pid::ROOT, "_meta").unwrap(),
        Some(Datum::from("4"))
    );
}

#[test]
fn test_zero_negative_and_text_values_are_not_references() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    store.put_field(Pid::ROOT, "zero", "0").unwrap();
    store.put_field(Pid::ROOT, "negative", "-2").unwrap();
    store.put_field(Pid::ROOT, "text", "hello").unwrap();
    store.put_field(Pid::ROOT, "empty", "").unwrap();
    store.put_field(pid(2), "name", "unreachable").unwrap();

    let metrics = collect(&store);

    assert_eq!(metrics.objects_marked, 1);
    assert_eq!(metrics.references_found, 0);
    assert_eq!(store.pids().unwrap(), pids(&[1]));
    assert_eq!(store.record(Pid::ROOT).unwrap().len(), 4);
}

#[test]
fn test_reference_to_missing_record_is_traced() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    store.put_field(Pid::ROOT, "ghost", "99").unwrap();

    let metrics = collect(&store);

    assert_eq!(metrics.objects_marked, 2);
    assert_eq!(store.pids().unwrap(), pids(&[1]));
}

#[test]
fn test_cycles_are_traced_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    store.put_field(Pid::ROOT, "next", "2").unwrap();
    store.put_field(pid(2), "next", "3").unwrap();
    store.put_field(pid(3), "next", "1").unwrap();
    store.put_field(pid(3), "self", "3").unwrap();

    let metrics = collect(&store);

    assert_eq!(metrics.objects_marked, 3);
    assert_eq!(metrics.references_found, 4);
    assert_eq!(store.pids().unwrap(), pids(&[1, 2, 3]));
}

#[test]
fn test_empty_store_collects_to_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    let metrics = collect(&store);

    assert_eq!(metrics.objects_marked, 1);
    assert!(store.is_empty().unwrap());
    assert!(store.is_open());
}

#[test]
fn test_unreachable_records_are_reclaimed() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    store.put_field(Pid::ROOT, "keep", "2").unwrap();
    store.put_field(pid(2), "name", "kept").unwrap();
    for raw in 10..60 {
        store
            .put_field(pid(raw), "payload", "x".repeat(256))
            .unwrap();
    }
    // Garbage pointing into live data does not keep itself alive.
    store.put_field(pid(10), "back", "1").unwrap();
    store.commit().unwrap();

    let metrics = collect(&store);

    assert_eq!(store.pids().unwrap(), pids(&[1, 2]));
    assert!(metrics.bytes_after < metrics.bytes_before);
    assert!(metrics.bytes_reclaimed() > 50 * 256);
}

#[test]
fn test_collected_store_persists_at_live_path() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    chain_with_metadata(&store);
    collect(&store);
    store.close().unwrap();

    assert!(!dir.path().join("objects.pdb.gc").exists());

    let reopened = open_store(&dir);
    assert_eq!(reopened.pids().unwrap(), pids(&[1, 2, 3]));
    assert_eq!(
        reopened.get_field(pid(3), "name").unwrap(),
        Some(Datum::from("leaf"))
    );
}

#[test]
fn test_second_cycle_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    chain_with_metadata(&store);
    store.put_field(pid(3), "up", "1").unwrap();

    let mut collector = Collector::new(store.clone(), CollectorConfig::default()).unwrap();
    let first = collector.collect().unwrap();
    let after_first: Vec<_> = store
        .pids()
        .unwrap()
        .into_iter()
        .map(|p| (p, store.record(p).unwrap()))
        .collect();

    let second = collector.collect().unwrap();
    let after_second: Vec<_> = store
        .pids()
        .unwrap()
        .into_iter()
        .map(|p| (p, store.record(p).unwrap()))
        .collect();

    assert_eq!(first.objects_marked, second.objects_marked);
    assert_eq!(after_first, after_second);
    assert_eq!(second.bytes_reclaimed(), 0);
    assert_eq!(collector.metrics().total_cycles, 2);
}
