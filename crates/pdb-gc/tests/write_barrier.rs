//! Mutations of the live store while a cycle is in progress.

use std::time::Duration;

use pdb_gc::{Collector, CollectorConfig, StepResult};
use pdb_store::{Datum, Pid, Store, StoreConfig};
use tempfile::TempDir;

fn pid(raw: u64) -> Pid {
    Pid::new(raw).unwrap()
}

fn open_store(dir: &TempDir) -> Store {
    let store = Store::new(StoreConfig::new(dir.path().join("objects.pdb")));
    store.open().unwrap();
    store
}

/// Collector over 1 -> {2, 3} that has traced only the root.
fn after_first_step(dir: &TempDir) -> (Store, Collector) {
    let store = open_store(dir);
    store.put_field(Pid::ROOT, "left", "2").unwrap();
    store.put_field(Pid::ROOT, "right", "3").unwrap();
    store.put_field(pid(2), "name", "l").unwrap();
    store.put_field(pid(3), "name", "r").unwrap();
    store.put_field(pid(7), "name", "garbage").unwrap();
    store.put_field(pid(8), "name", "detached").unwrap();

    let config = CollectorConfig {
        max_step_time: Duration::ZERO,
        ..Default::default()
    };
    let mut collector = Collector::new(store.clone(), config).unwrap();
    collector.begin().unwrap();
    assert!(!collector.step().unwrap().is_complete());
    (store, collector)
}

fn finish(collector: &mut Collector) {
    while !collector.step().unwrap().is_complete() {}
}

#[test]
fn test_unvisited_mutation_not_forwarded() {
    let dir = tempfile::tempdir().unwrap();
    let (store, mut collector) = after_first_step(&dir);

    store.put_field(pid(7), "name", "changed").unwrap();
    store.append_field(pid(7), "log", "x").unwrap();

    let out = collector.replacement_store();
    assert_eq!(out.get_field(pid(7), "name").unwrap(), None);
    assert_eq!(out.get_field(pid(7), "log").unwrap(), None);

    finish(&mut collector);
    assert!(store.record(pid(7)).unwrap().is_empty());
    let metrics = collector.last_cycle_metrics().unwrap();
    assert_eq!(metrics.mutations_dropped, 2);
    assert_eq!(metrics.mutations_forwarded, 0);
}

#[test]
fn test_visited_mutation_forwarded_identically() {
    let dir = tempfile::tempdir().unwrap();
    let (store, mut collector) = after_first_step(&dir);

    // Root is traced; 2 is visited but still queued.
    store.put_field(Pid::ROOT, "title", "new").unwrap();
    store.append_field(pid(2), "name", "eft").unwrap();
    store.remove_field(pid(3), "name").unwrap();

    let out = collector.replacement_store();
    assert_eq!(
        out.get_field(Pid::ROOT, "title").unwrap(),
        Some(Datum::from("new"))
    );
    assert_eq!(out.get_field(pid(2), "name").unwrap(), Some(Datum::from("eft")));
    assert_eq!(out.get_field(pid(3), "name").unwrap(), None);

    finish(&mut collector);

    assert_eq!(
        store.get_field(Pid::ROOT, "title").unwrap(),
        Some(Datum::from("new"))
    );
    assert_eq!(store.get_field(pid(2), "name").unwrap(), Some(Datum::from("left")));
    assert_eq!(store.get_field(pid(3), "name").unwrap(), None);
    assert_eq!(
        collector.last_cycle_metrics().unwrap().mutations_forwarded,
        3
    );
}

#[test]
fn test_deleted_field_of_traced_record_stays_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let (store, mut collector) = after_first_step(&dir);

    store.remove_field(Pid::ROOT, "right").unwrap();
    finish(&mut collector);

    assert_eq!(store.get_field(Pid::ROOT, "right").unwrap(), None);
    // 3 was already visited when its last reference went away.
    assert_eq!(store.get_field(pid(3), "name").unwrap(), Some(Datum::from("r")));
}

#[test]
fn test_reference_stored_into_traced_record_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let (store, mut collector) = after_first_step(&dir);

    store.put_field(Pid::ROOT, "late", "8").unwrap();
    assert!(collector.is_visited(pid(8)));

    finish(&mut collector);

    assert_eq!(
        store.get_field(pid(8), "name").unwrap(),
        Some(Datum::from("detached"))
    );
    assert!(store.record(pid(7)).unwrap().is_empty());
    let metrics = collector.last_cycle_metrics().unwrap();
    assert_eq!(metrics.references_shaded, 1);
    assert_eq!(metrics.objects_marked, 4);
}

#[test]
fn test_field_name_with_separator_survives_swap() {
    let dir = tempfile::tempdir().unwrap();
    let (store, mut collector) = after_first_step(&dir);
    store.remove_field(Pid::ROOT, "a/b").unwrap();
    store.put_field(Pid::ROOT, "a/b", "new").unwrap();
    store.put_field(Pid::ROOT, "x/y", "gone").unwrap();
    store.remove_field(Pid::ROOT, "x/y").unwrap();

    finish(&mut collector);

    assert_eq!(
        store.get_field(Pid::ROOT, "a/b").unwrap(),
        Some(Datum::from("new"))
    );
    assert_eq!(store.get_field(Pid::ROOT, "x/y").unwrap(), None);
    assert_eq!(collector.last_cycle_metrics().unwrap().malformed_keys, 0);
}

#[test]
fn test_field_name_with_separator_updated_after_trace() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    store.put_field(Pid::ROOT, "a/b", "old").unwrap();
    store.put_field(Pid::ROOT, "c", "2").unwrap();
    let config = CollectorConfig {
        max_step_time: Duration::ZERO,
        ..Default::default()
    };
    let mut collector = Collector::new(store.clone(), config).unwrap();
    collector.begin().unwrap();
    collector.step().unwrap();
    assert_eq!(
        collector.replacement_store().get_field(Pid::ROOT, "a/b").unwrap(),
        Some(Datum::from("old"))
    );

    store.put_field(Pid::ROOT, "a/b", "new").unwrap();
    finish(&mut collector);

    assert_eq!(
        store.get_field(Pid::ROOT, "a/b").unwrap(),
        Some(Datum::from("new"))
    );
}

#[test]
fn test_malformed_keys_do_not_fault() {
    let dir = tempfile::tempdir().unwrap();
    let (store, mut collector) = after_first_step(&dir);

    store.put(b"not-a-record", b"1").unwrap();
    store.put(b"0/zero", b"1").unwrap();
    store.remove_at(b"abc/def").unwrap();

    finish(&mut collector);

    assert_eq!(store.get(b"not-a-record").unwrap(), None);
    assert_eq!(collector.last_cycle_metrics().unwrap().malformed_keys, 3);
}

#[test]
fn test_no_forwarding_after_completion() {
    let dir = tempfile::tempdir().unwrap();
    let (store, mut collector) = after_first_step(&dir);
    finish(&mut collector);

    assert_eq!(collector.step().unwrap(), StepResult::Idle);
    store.put_field(Pid::ROOT, "after", "x").unwrap();

    assert!(!store.has_hooks());
    assert!(!collector.replacement_store().is_open());
    assert_eq!(
        store.get_field(Pid::ROOT, "after").unwrap(),
        Some(Datum::from("x"))
    );
}
