//! Persistence for grant records.
//!
//! A store holds at most one [`GrantRecord`] for one resource. It knows nothing
//! about modes or expiry; it only reads, replaces, and serializes writers.
//!
//! # Implementations
//!
//! - [`FileStore`]: one JSON file per resource, replaced atomically, with a
//!   create-new lock file guarding the exclusive section
//! - [`MemoryStore`]: in-process, mutex-guarded

mod file;
mod memory;

pub use file::FileStore;
#[allow(unused_imports)]
pub use memory::MemoryStore;

use crate::error::Result;
use crate::grant::GrantRecord;

/// Durable home of one resource's grant record.
pub trait Store {
    /// The current record, or `None` when the resource is free.
    fn read(&self) -> Result<Option<GrantRecord>>;

    /// Replace the record. `None` deletes it.
    fn write(&self, record: Option<&GrantRecord>) -> Result<()>;

    /// Run `op` while no other writer can enter the exclusive section for this
    /// resource.
    ///
    /// The `read → decide → write` sequence of every mutating operation runs
    /// inside `op`.
    fn exclusive<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
        Self: Sized;

    /// Like [`Store::exclusive`], but gives up at once when another writer is
    /// inside. Returns `Ok(None)` without running `op` in that case.
    fn try_exclusive<T, F>(&self, op: F) -> Result<Option<T>>
    where
        F: FnOnce(&Self) -> Result<T>,
        Self: Sized;
}
