//! Object ids and the `<pid>/<field>` key convention.

use std::fmt;

/// Separator between the pid and the field name in a record key.
pub const SEPARATOR: u8 = b'/';

/// Field names starting with this byte are metadata and never hold references.
pub const METADATA_MARKER: u8 = b'_';

/// Identifier of one persisted object.
///
/// Always positive; `0` means "not a reference" and cannot be a `Pid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(u64);

impl Pid {
    /// The distinguished root object. Tracing always starts here.
    pub const ROOT: Self = Self(1);

    /// Returns `None` for zero.
    #[must_use]
    pub const fn new(raw: u64) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// The raw integer value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u64> for Pid {
    type Error = ();

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or(())
    }
}

/// Key prefix shared by every field of `pid`, including the trailing separator.
#[must_use]
pub fn record_prefix(pid: Pid) -> Vec<u8> {
    let mut prefix = pid.0.to_string().into_bytes();
    prefix.push(SEPARATOR);
    prefix
}

/// Builds the physical key for one field of `pid`.
#[must_use]
pub fn record_key(pid: Pid, field: &[u8]) -> Vec<u8> {
    let mut key = record_prefix(pid);
    key.extend_from_slice(field);
    key
}

/// Splits a physical key at its first separator into pid and field name.
///
/// The field name may itself contain separators. Returns `None` when the key
/// has no separator or the part before it is not a positive decimal integer.
#[must_use]
pub fn split_key(key: &[u8]) -> Option<(Pid, &[u8])> {
    let slash = key.iter().position(|&b| b == SEPARATOR)?;
    let pid = parse_decimal(&key[..slash])?;
    Some((pid, &key[slash + 1..]))
}

/// Extracts the pid from a physical key. See [`split_key`].
#[must_use]
pub fn parse_pid(key: &[u8]) -> Option<Pid> {
    split_key(key).map(|(pid, _)| pid)
}

/// Whether `field` is a metadata field.
#[must_use]
pub fn is_metadata(field: &[u8]) -> bool {
    field.first() == Some(&METADATA_MARKER)
}

fn parse_decimal(digits: &[u8]) -> Option<Pid> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let mut value: u64 = 0;
    for &d in digits {
        value = value.checked_mul(10)?.checked_add(u64::from(d - b'0'))?;
    }
    Pid::new(value)
}
