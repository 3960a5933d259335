use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io::{self, BufWriter};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::codec::{self, Entries};
use crate::cursor::Cursor;
use crate::datum::Datum;
use crate::error::{Result, StoreError};
use crate::hooks::MutationHooks;
use crate::key::{self, Pid};

/// Configuration applied before a store is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    path: PathBuf,
    use_backups: bool,
    hard_sync: bool,
}

impl StoreConfig {
    /// Creates a configuration for the store file at `path`.
    ///
    /// Backups and hard sync are off by default.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            use_backups: false,
            hard_sync: false,
        }
    }

    /// Keep the previous file as `<path>.bak` on every commit.
    #[must_use]
    pub const fn use_backups(mut self, use_backups: bool) -> Self {
        self.use_backups = use_backups;
        self
    }

    /// `fsync` the file before it replaces the previous version.
    #[must_use]
    pub const fn hard_sync(mut self, hard_sync: bool) -> Self {
        self.hard_sync = hard_sync;
        self
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether backups are kept.
    #[must_use]
    pub const fn backups_enabled(&self) -> bool {
        self.use_backups
    }

    /// Whether commits are synced to disk.
    #[must_use]
    pub const fn hard_sync_enabled(&self) -> bool {
        self.hard_sync
    }
}

struct StoreState {
    config: StoreConfig,
    /// `None` while the store is closed.
    entries: Option<Entries>,
    dirty: bool,
    hooks: Option<Arc<dyn MutationHooks>>,
}

impl StoreState {
    fn closed(&self) -> StoreError {
        StoreError::Closed {
            path: self.config.path.clone(),
        }
    }

    fn entries(&self) -> Result<&Entries> {
        self.entries.as_ref().ok_or_else(|| self.closed())
    }

    fn entries_mut(&mut self) -> Result<&mut Entries> {
        if self.entries.is_none() {
            return Err(self.closed());
        }
        self.dirty = true;
        Ok(self.entries.get_or_insert_with(Entries::new))
    }
}

/// Handle to a file-backed key/value store.
///
/// Cloning a `Store` yields another handle to the same store; cursors and
/// hooks hold such handles. All entries live in memory while the store is
/// open and are written to the backing file by [`commit`](Self::commit) and
/// [`close`](Self::close).
#[derive(Clone)]
pub struct Store {
    state: Arc<RwLock<StoreState>>,
}

impl Store {
    /// Creates a closed store. Nothing touches the disk until `open`.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState {
                config,
                entries: None,
                dirty: false,
                hooks: None,
            })),
        }
    }

    /// The configuration the store was created with.
    #[must_use]
    pub fn config(&self) -> StoreConfig {
        self.state.read().config.clone()
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.state.read().config.path.clone()
    }

    /// Whether the store is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.read().entries.is_some()
    }

    /// Whether `other` is a handle to the same store.
    #[must_use]
    pub fn same_store(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Opens the store, loading the backing file if one exists.
    ///
    /// # Errors
    ///
    /// Fails if the store is already open, or the file cannot be read or
    /// decoded.
    pub fn open(&self) -> Result<()> {
        let mut state = self.state.write();
        let path = state.config.path.clone();
        if state.entries.is_some() {
            return Err(StoreError::AlreadyOpen { path });
        }

        let entries = match fs::read(&path) {
            Ok(bytes) => codec::decode(&bytes, &path)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Entries::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "store_open");

        state.entries = Some(entries);
        state.dirty = false;
        Ok(())
    }

    /// Writes pending changes and closes the store. Closing a closed store
    /// does nothing.
    ///
    /// # Errors
    ///
    /// Fails if the backing file cannot be written. The store stays open in
    /// that case.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.write();
        let Some(entries) = state.entries.as_ref() else {
            return Ok(());
        };
        if state.dirty || !state.config.path.exists() {
            write_file(&state.config, entries)?;
        }
        tracing::debug!(path = %state.config.path.display(), "store_close");

        state.entries = None;
        state.dirty = false;
        Ok(())
    }

    /// Writes all entries to the backing file.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed or the file cannot be written.
    pub fn commit(&self) -> Result<()> {
        let mut state = self.state.write();
        write_file(&state.config, state.entries()?)?;
        state.dirty = false;
        Ok(())
    }

    /// Discards the store's contents and deletes its backing file and backup.
    ///
    /// The store is closed afterwards.
    ///
    /// # Errors
    ///
    /// Fails if an existing file cannot be deleted.
    pub fn remove(&self) -> Result<()> {
        let mut state = self.state.write();
        state.entries = None;
        state.dirty = false;

        let path = &state.config.path;
        for file in [path.clone(), sibling(path, "bak"), sibling(path, "tmp")] {
            match fs::remove_file(&file) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        tracing::debug!(path = %path.display(), "store_remove");
        Ok(())
    }

    /// Size of the store in bytes.
    ///
    /// For an open store this is the size its backing file will have after the
    /// next commit; for a closed store it is the size of the file on disk.
    ///
    /// # Errors
    ///
    /// Fails if the file metadata cannot be read.
    pub fn size_in_bytes(&self) -> Result<u64> {
        let state = self.state.read();
        if let Some(entries) = &state.entries {
            return Ok(codec::encoded_len(entries));
        }
        match fs::metadata(&state.config.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// [`size_in_bytes`](Self::size_in_bytes) in mebibytes.
    ///
    /// # Errors
    ///
    /// See `size_in_bytes`.
    #[allow(clippy::cast_precision_loss)]
    pub fn size_in_mb(&self) -> Result<f64> {
        Ok(self.size_in_bytes()? as f64 / (1024.0 * 1024.0))
    }

    /// Moves this store's backing file onto `other`'s location, replacing
    /// whatever file `other` had. Both stores must be closed.
    ///
    /// # Errors
    ///
    /// Fails if either store is open or the rename fails.
    pub fn move_to(&self, other: &Self) -> Result<()> {
        if self.same_store(other) {
            return Ok(());
        }
        let src = self.state.read();
        let dst = other.state.read();
        for state in [&src, &dst] {
            if state.entries.is_some() {
                return Err(StoreError::StillOpen {
                    path: state.config.path.clone(),
                });
            }
        }

        fs::rename(&src.config.path, &dst.config.path)?;
        tracing::debug!(
            from = %src.config.path.display(),
            to = %dst.config.path.display(),
            "store_move"
        );
        Ok(())
    }

    /// Installs mutation hooks, replacing any previously installed ones.
    pub fn set_hooks(&self, hooks: Arc<dyn MutationHooks>) {
        self.state.write().hooks = Some(hooks);
    }

    /// Removes installed mutation hooks.
    pub fn clear_hooks(&self) {
        self.state.write().hooks = None;
    }

    /// Whether mutation hooks are installed.
    #[must_use]
    pub fn has_hooks(&self) -> bool {
        self.state.read().hooks.is_some()
    }

    /// Stores `value` at `key`.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let hooks = {
            let mut state = self.state.write();
            state.entries_mut()?.insert(key.to_vec(), value.to_vec());
            state.hooks.clone()
        };
        if let Some(hooks) = hooks {
            hooks.on_put(key, value);
        }
        Ok(())
    }

    /// Appends `value` to the bytes stored at `key`, creating the entry if it
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn append(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let hooks = {
            let mut state = self.state.write();
            state
                .entries_mut()?
                .entry(key.to_vec())
                .or_default()
                .extend_from_slice(value);
            state.hooks.clone()
        };
        if let Some(hooks) = hooks {
            hooks.on_append(key, value);
        }
        Ok(())
    }

    /// Deletes the entry at `key`, if any.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn remove_at(&self, key: &[u8]) -> Result<()> {
        let hooks = {
            let mut state = self.state.write();
            state.entries_mut()?.remove(key);
            state.hooks.clone()
        };
        if let Some(hooks) = hooks {
            hooks.on_delete(key);
        }
        Ok(())
    }

    /// Reads the value at `key`.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn get(&self, key: &[u8]) -> Result<Option<Datum>> {
        let state = self.state.read();
        Ok(state.entries()?.get(key).map(|v| Datum::new(v.clone())))
    }

    /// Number of entries.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn len(&self) -> Result<usize> {
        Ok(self.state.read().entries()?.len())
    }

    /// Whether the store has no entries.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.state.read().entries()?.is_empty())
    }

    /// Stores one field of object `pid`.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn put_field(&self, pid: Pid, field: &str, value: impl AsRef<[u8]>) -> Result<()> {
        self.put(&key::record_key(pid, field.as_bytes()), value.as_ref())
    }

    /// Appends to one field of object `pid`.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn append_field(&self, pid: Pid, field: &str, value: impl AsRef<[u8]>) -> Result<()> {
        self.append(&key::record_key(pid, field.as_bytes()), value.as_ref())
    }

    /// Deletes one field of object `pid`.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn remove_field(&self, pid: Pid, field: &str) -> Result<()> {
        self.remove_at(&key::record_key(pid, field.as_bytes()))
    }

    /// Reads one field of object `pid`.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn get_field(&self, pid: Pid, field: &str) -> Result<Option<Datum>> {
        self.get(&key::record_key(pid, field.as_bytes()))
    }

    /// All fields of object `pid` as `(field name, value)` in key order.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn record(&self, pid: Pid) -> Result<Vec<(Vec<u8>, Datum)>> {
        let prefix = key::record_prefix(pid);
        let state = self.state.read();
        Ok(state
            .entries()?
            .range::<[u8], _>((Bound::Included(prefix.as_slice()), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, v)| (k[prefix.len()..].to_vec(), Datum::new(v.clone())))
            .collect())
    }

    /// Every pid that has at least one field.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn pids(&self) -> Result<BTreeSet<Pid>> {
        let state = self.state.read();
        Ok(state
            .entries()?
            .keys()
            .filter_map(|k| key::parse_pid(k))
            .collect())
    }

    /// Creates an unpositioned cursor over this store.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.clone())
    }

    /// First entry whose key starts with `prefix`, strictly after `after` when
    /// given.
    pub(crate) fn seek(
        &self,
        prefix: &[u8],
        after: Option<&[u8]>,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let lower = after.map_or(Bound::Included(prefix), Bound::Excluded);
        let state = self.state.read();
        Ok(state
            .entries()?
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone())))
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Store")
            .field("path", &state.config.path)
            .field("open", &state.entries.is_some())
            .field("dirty", &state.dirty)
            .field("hooks", &state.hooks.is_some())
            .finish()
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Writes to `<path>.tmp` and renames over `path`, so a crash never leaves a
/// half-written store behind.
fn write_file(config: &StoreConfig, entries: &Entries) -> Result<()> {
    let tmp = sibling(&config.path, "tmp");
    let mut writer = BufWriter::new(fs::File::create(&tmp)?);
    codec::encode(&mut writer, entries)?;
    let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
    if config.hard_sync {
        file.sync_all()?;
    }
    drop(file);

    if config.use_backups && config.path.exists() {
        fs::copy(&config.path, sibling(&config.path, "bak"))?;
    }
    fs::rename(&tmp, &config.path)?;
    Ok(())
}
