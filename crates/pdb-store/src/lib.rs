//! File-backed key/value object store.
//!
//! `pdb-store` holds records of a persistent object graph. Every field of an
//! object is one entry whose key has the form `<pid>/<field>`, so all fields of
//! one object sort next to each other and can be walked with a [`Cursor`].
//!
//! A [`Store`] is a cheap, clonable handle. The application, cursors and
//! installed [`MutationHooks`] all share the same underlying state.
//!
//! ```no_run
//! use pdb_store::{Pid, Store, StoreConfig};
//!
//! let store = Store::new(StoreConfig::new("/tmp/objects.pdb"));
//! store.open()?;
//! store.put_field(Pid::ROOT, "child", "2")?;
//! store.commit()?;
//! store.close()?;
//! # Ok::<(), pdb_store::StoreError>(())
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod codec;
mod cursor;
mod datum;
mod error;
mod hooks;
pub mod key;
mod store;

pub use cursor::Cursor;
pub use datum::Datum;
pub use error::{Result, StoreError};
pub use hooks::MutationHooks;
pub use key::Pid;
pub use store::{Store, StoreConfig};
