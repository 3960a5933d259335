//! Backing file encoding.
//!
//! ```text
//! | magic "PDB1" (4) | { key_len u32-le (4) | key | value_len u32-le (4) | value }* |
//! ```

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;

use crate::error::{Result, StoreError};

pub(crate) type Entries = BTreeMap<Vec<u8>, Vec<u8>>;

const MAGIC: &[u8; 4] = b"PDB1";
const LEN_SIZE: usize = 4;

pub(crate) fn encode<W: Write>(out: &mut W, entries: &Entries) -> io::Result<()> {
    out.write_all(MAGIC)?;
    for (key, value) in entries {
        write_chunk(out, key)?;
        write_chunk(out, value)?;
    }
    Ok(())
}

fn write_chunk<W: Write>(out: &mut W, bytes: &[u8]) -> io::Result<()> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "entry larger than 4GiB"))?;
    out.write_all(&len.to_le_bytes())?;
    out.write_all(bytes)
}

pub(crate) fn decode(bytes: &[u8], path: &Path) -> Result<Entries> {
    let corrupt = |detail: String| StoreError::Corrupt {
        path: path.to_path_buf(),
        detail,
    };

    let Some(body) = bytes.strip_prefix(MAGIC.as_slice()) else {
        return Err(corrupt("missing file magic".to_string()));
    };

    let mut entries = Entries::new();
    let mut pos = 0;
    while pos < body.len() {
        let key = read_chunk(body, &mut pos)
            .ok_or_else(|| corrupt(format!("truncated key at offset {pos}")))?;
        let value = read_chunk(body, &mut pos)
            .ok_or_else(|| corrupt(format!("truncated value at offset {pos}")))?;
        entries.insert(key.to_vec(), value.to_vec());
    }
    Ok(entries)
}

fn read_chunk<'a>(body: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    let len_end = pos.checked_add(LEN_SIZE)?;
    let len_bytes: [u8; LEN_SIZE] = body.get(*pos..len_end)?.try_into().ok()?;
    let len = usize::try_from(u32::from_le_bytes(len_bytes)).ok()?;
    let end = len_end.checked_add(len)?;
    let chunk = body.get(len_end..end)?;
    *pos = end;
    Some(chunk)
}

/// Size in bytes `encode` would produce.
pub(crate) fn encoded_len(entries: &Entries) -> u64 {
    let body: usize = entries
        .iter()
        .map(|(k, v)| 2 * LEN_SIZE + k.len() + v.len())
        .sum();
    (MAGIC.len() + body) as u64
}
