//! Per-object work of a trace step: reference scan and record replication.

use std::collections::HashSet;

use pdb_store::key::is_metadata;
use pdb_store::{Cursor, Pid};

use crate::error::Result;

/// Scans the fields of `pid` for references and hands each one to `enqueue`.
///
/// Metadata fields (leading `_`) are skipped. A field is a reference when its
/// value decodes to a positive integer. Each value is dropped before the
/// cursor advances, so memory use stays bounded by one field.
///
/// Writes nothing to any store. Returns the number of references found,
/// counting duplicates.
pub fn mark_record(
    cursor: &mut Cursor,
    pid: Pid,
    mut enqueue: impl FnMut(Pid),
) -> Result<usize> {
    let mut found = 0;
    cursor.set_pid(pid);
    cursor.first()?;

    while let Some(field) = cursor.field() {
        if !is_metadata(field) {
            if let Some(child) = cursor.value().and_then(|value| value.as_pid()) {
                enqueue(child);
                found += 1;
            }
        }
        cursor.next()?;
    }
    Ok(found)
}

/// Makes the replacement store's copy of `pid` equal the live record.
///
/// Every live field is written to the replacement store, then fields that
/// exist only in the replacement store are deleted. Returns the number of
/// fields copied.
pub fn replicate_record(live: &mut Cursor, out: &mut Cursor, pid: Pid) -> Result<usize> {
    let mut copied = HashSet::new();
    live.set_pid(pid);
    live.first()?;

    while let (Some(key), Some(value)) = (live.key(), live.value()) {
        out.store().put(key, value.as_bytes())?;
        copied.insert(key.to_vec());
        live.next()?;
    }

    let mut stale = Vec::new();
    out.set_pid(pid);
    out.first()?;
    while let Some(key) = out.key() {
        if !copied.contains(key) {
            stale.push(key.to_vec());
        }
        out.next()?;
    }
    for key in &stale {
        out.store().remove_at(key)?;
    }

    Ok(copied.len())
}
