use std::fmt;

use crate::key::Pid;

/// An owned field value.
///
/// Values are opaque bytes. A value is treated as a reference to another
/// object when it decodes to a positive integer (see [`Datum::as_i64`]).
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Datum(Vec<u8>);

impl Datum {
    /// Wraps raw bytes.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw bytes of the value.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the datum, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decodes the value as a decimal integer.
    ///
    /// Leading ASCII whitespace and one sign are accepted, then as many digits
    /// as follow. Anything unparsable decodes to `0`. Out-of-range values
    /// saturate.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        let mut bytes = self.0.iter().copied().skip_while(u8::is_ascii_whitespace).peekable();
        let negative = match bytes.peek() {
            Some(b'-') => {
                bytes.next();
                true
            }
            Some(b'+') => {
                bytes.next();
                false
            }
            _ => false,
        };

        let mut value: i64 = 0;
        for b in bytes.take_while(u8::is_ascii_digit) {
            let digit = i64::from(b - b'0');
            value = if negative {
                value.saturating_mul(10).saturating_sub(digit)
            } else {
                value.saturating_mul(10).saturating_add(digit)
            };
        }
        value
    }

    /// Decodes the value as an object reference.
    ///
    /// Only positive integers name objects; zero, negative and non-numeric
    /// values are plain data.
    #[must_use]
    pub fn as_pid(&self) -> Option<Pid> {
        u64::try_from(self.as_i64()).ok().and_then(Pid::new)
    }
}

impl fmt::Debug for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Datum({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl From<Vec<u8>> for Datum {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Datum {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<Pid> for Datum {
    fn from(pid: Pid) -> Self {
        Self(pid.get().to_string().into_bytes())
    }
}

impl AsRef<[u8]> for Datum {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
