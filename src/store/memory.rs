//! In-process store.

use super::Store;
use crate::error::Result;
use crate::grant::GrantRecord;
use std::sync::{Mutex, MutexGuard, TryLockError};

/// A store that keeps the record in memory.
///
/// The record itself and the writer section are guarded separately so that
/// `read`/`write` can be called from inside [`Store::exclusive`].
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<GrantRecord>>,
    writer: Mutex<()>,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that starts out holding `record`.
    pub fn with_record(record: GrantRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
            writer: Mutex::new(()),
        }
    }

    fn record(&self) -> MutexGuard<'_, Option<GrantRecord>> {
        // Writes are a single assignment, so a poisoned guard still holds a whole record.
        self.record.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Store for MemoryStore {
    fn read(&self) -> Result<Option<GrantRecord>> {
        Ok(self.record().clone())
    }

    fn write(&self, record: Option<&GrantRecord>) -> Result<()> {
        *self.record() = record.cloned();
        Ok(())
    }

    fn exclusive<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let _writer = self.writer.lock().unwrap_or_else(|poison| poison.into_inner());
        op(self)
    }

    fn try_exclusive<T, F>(&self, op: F) -> Result<Option<T>>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let _writer = match self.writer.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poison)) => poison.into_inner(),
            Err(TryLockError::WouldBlock) => return Ok(None),
        };
        op(self).map(Some)
    }
}
