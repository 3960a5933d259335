use crate::datum::Datum;
use crate::error::Result;
use crate::key::{self, Pid};
use crate::store::Store;

/// Walks the fields of one object in key order.
///
/// A cursor remembers the key it is positioned on and seeks past it on
/// [`next`](Self::next), so the store may be mutated between calls.
///
/// ```no_run
/// # use pdb_store::{Pid, Store, StoreConfig};
/// # let store = Store::new(StoreConfig::new("/tmp/objects.pdb"));
/// let mut cursor = store.cursor();
/// cursor.set_pid(Pid::ROOT);
/// cursor.first()?;
/// while let Some(field) = cursor.field() {
///     println!("{:?} = {:?}", field, cursor.value());
///     cursor.next()?;
/// }
/// # Ok::<(), pdb_store::StoreError>(())
/// ```
#[derive(Debug)]
pub struct Cursor {
    store: Store,
    pid: Option<Pid>,
    prefix: Vec<u8>,
    current: Option<(Vec<u8>, Vec<u8>)>,
}

impl Cursor {
    pub(crate) const fn new(store: Store) -> Self {
        Self {
            store,
            pid: None,
            prefix: Vec::new(),
            current: None,
        }
    }

    /// Positions the cursor on object `pid`. Call [`first`](Self::first)
    /// before reading fields.
    pub fn set_pid(&mut self, pid: Pid) {
        self.pid = Some(pid);
        self.prefix = key::record_prefix(pid);
        self.current = None;
    }

    /// The object the cursor is positioned on.
    #[must_use]
    pub const fn pid(&self) -> Option<Pid> {
        self.pid
    }

    /// Moves to the object's first field.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn first(&mut self) -> Result<()> {
        self.current = if self.pid.is_some() {
            self.store.seek(&self.prefix, None)?
        } else {
            None
        };
        Ok(())
    }

    /// Moves to the next field. Past the last field the cursor is exhausted
    /// and stays so.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<()> {
        if let Some((key, _)) = self.current.take() {
            self.current = self.store.seek(&self.prefix, Some(key.as_slice()))?;
        }
        Ok(())
    }

    /// Full physical key of the current field, `None` once exhausted.
    #[must_use]
    pub fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(k, _)| k.as_slice())
    }

    /// Name of the current field, `None` once exhausted.
    #[must_use]
    pub fn field(&self) -> Option<&[u8]> {
        self.key().map(|k| &k[self.prefix.len()..])
    }

    /// Value of the current field, `None` once exhausted.
    #[must_use]
    pub fn value(&self) -> Option<Datum> {
        self.current.as_ref().map(|(_, v)| Datum::new(v.clone()))
    }

    /// The store this cursor reads from.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreConfig;

    fn fields(cursor: &mut Cursor) -> Vec<String> {
        let mut out = Vec::new();
        cursor.first().unwrap();
        while let Some(field) = cursor.field() {
            out.push(String::from_utf8_lossy(field).into_owned());
            cursor.next().unwrap();
        }
        out
    }

    #[test]
    fn test_iterates_only_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(StoreConfig::new(dir.path().join("c.pdb")));
        store.open().unwrap();
        let two = Pid::new(2).unwrap();
        store.put_field(Pid::ROOT, "x", "1").unwrap();
        store.put_field(two, "b", "1").unwrap();
        store.put_field(two, "a", "1").unwrap();
        store.put_field(Pid::new(20).unwrap(), "a", "1").unwrap();

        let mut cursor = store.cursor();
        cursor.set_pid(two);
        assert_eq!(fields(&mut cursor), vec!["a", "b"]);
        assert_eq!(cursor.key(), None);
        assert_eq!(cursor.value(), None);
    }

    #[test]
    fn test_survives_mutation_between_calls() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(StoreConfig::new(dir.path().join("c.pdb")));
        store.open().unwrap();
        store.put_field(Pid::ROOT, "a", "1").unwrap();
        store.put_field(Pid::ROOT, "c", "3").unwrap();

        let mut cursor = store.cursor();
        cursor.set_pid(Pid::ROOT);
        cursor.first().unwrap();
        assert_eq!(cursor.field(), Some(&b"a"[..]));

        store.put_field(Pid::ROOT, "b", "2").unwrap();
        store.remove_field(Pid::ROOT, "a").unwrap();
        cursor.next().unwrap();
        assert_eq!(cursor.field(), Some(&b"b"[..]));
        assert_eq!(cursor.value(), Some(Datum::from("2")));
    }

    #[test]
    fn test_unpositioned_cursor_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(StoreConfig::new(dir.path().join("c.pdb")));
        store.open().unwrap();
        store.put_field(Pid::ROOT, "a", "1").unwrap();

        let mut cursor = store.cursor();
        cursor.first().unwrap();
        assert_eq!(cursor.field(), None);
    }
}
