//! File-backed store.
//!
//! The record of resource `name` lives in `resources/{name}.json` and is
//! replaced atomically on every write; deleting the file frees the resource.
//! The exclusive section is `resources/{name}.lock`, see [`crate::locks`].

use super::Store;
use crate::context::{validate_resource_name, StoreContext};
use crate::error::{GrantError, Result};
use crate::fs::{atomic_write, remove_if_exists};
use crate::grant::GrantRecord;
use crate::locks::{self, LockGuard, LockMetadata, LockWait};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Store for one resource inside a state directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    resource: String,
    record_path: PathBuf,
    lock_path: PathBuf,
    wait: LockWait,
}

impl FileStore {
    /// Open the store of `resource` under `ctx`.
    pub fn open(ctx: &StoreContext, resource: &str, wait: LockWait) -> Result<Self> {
        validate_resource_name(resource)?;

        Ok(Self {
            resource: resource.to_string(),
            record_path: ctx.record_path(resource),
            lock_path: ctx.lock_path(resource),
            wait,
        })
    }

    #[allow(dead_code)]
    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn run_locked<T, F>(&self, guard: LockGuard, op: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let result = op(self);
        // A leftover lock file is only logged; the operation's result stands.
        if let Err(e) = guard.release() {
            warn!(resource = %self.resource, error = %e, "failed to release store lock");
        }
        result
    }
}

impl Store for FileStore {
    fn read(&self) -> Result<Option<GrantRecord>> {
        let content = match fs::read_to_string(&self.record_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(GrantError::StoreError(format!(
                    "failed to read grant record '{}': {}",
                    self.record_path.display(),
                    e
                )));
            }
        };

        let record: GrantRecord = serde_json::from_str(&content).map_err(|e| {
            GrantError::StoreError(format!(
                "failed to parse grant record '{}': {}",
                self.record_path.display(),
                e
            ))
        })?;

        record.validate().map_err(|e| {
            GrantError::StoreError(format!(
                "grant record '{}' is corrupt: {}",
                self.record_path.display(),
                e
            ))
        })?;

        Ok(Some(record))
    }

    fn write(&self, record: Option<&GrantRecord>) -> Result<()> {
        match record {
            Some(record) => {
                let mut json = serde_json::to_string_pretty(record).map_err(|e| {
                    GrantError::StoreError(format!("failed to serialize grant record: {}", e))
                })?;
                json.push('\n');
                atomic_write(&self.record_path, json.as_bytes())?;
                debug!(resource = %self.resource, holders = record.holders.len(), "record written");
            }
            None => {
                remove_if_exists(&self.record_path)?;
                debug!(resource = %self.resource, "record deleted");
            }
        }

        Ok(())
    }

    fn exclusive<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let metadata = LockMetadata::new(&self.resource);
        let guard = locks::acquire_lock(&self.lock_path, &metadata, self.wait)?;
        self.run_locked(guard, op)
    }

    fn try_exclusive<T, F>(&self, op: F) -> Result<Option<T>>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let metadata = LockMetadata::new(&self.resource);
        let Some(guard) = locks::try_acquire(&self.lock_path, &metadata)? else {
            debug!(resource = %self.resource, "store lock busy");
            return Ok(None);
        };
        self.run_locked(guard, op).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::grant::{Engine, Mode};
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn open_store(temp_dir: &TempDir, resource: &str) -> FileStore {
        let ctx = StoreContext::at(temp_dir.path());
        FileStore::open(&ctx, resource, LockWait::default()).unwrap()
    }

    #[test]
    fn test_missing_record_is_free() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, "db");

        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn test_write_read_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, "db");
        let expires_at = Utc.with_ymd_and_hms(2026, 5, 1, 8, 30, 0).unwrap();
        let mut record = GrantRecord::new(Mode::Shared, "alice", expires_at);
        record.holders.insert("bob".to_string(), expires_at);

        store.write(Some(&record)).unwrap();
        assert!(store.record_path().exists());
        assert_eq!(store.read().unwrap(), Some(record));

        store.write(None).unwrap();
        assert!(!store.record_path().exists());
        assert!(store.read().unwrap().is_none());

        // Deleting an absent record is fine.
        store.write(None).unwrap();
    }

    #[test]
    fn test_persisted_layout() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, "db");
        let expires_at = Utc.with_ymd_and_hms(2026, 5, 1, 8, 30, 0).unwrap();

        store
            .write(Some(&GrantRecord::new(Mode::Exclusive, "carol", expires_at)))
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.record_path()).unwrap()).unwrap();
        assert_eq!(raw["mode"], "exclusive");
        assert_eq!(raw["holders"]["carol"], "2026-05-01T08:30:00Z");
    }

    #[test]
    fn test_corrupt_record_is_store_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, "db");
        fs::create_dir_all(store.record_path().parent().unwrap()).unwrap();

        fs::write(store.record_path(), "{ not json").unwrap();
        let err = store.read().unwrap_err();
        assert!(matches!(err, GrantError::StoreError(_)));

        // Parses, but breaks the exclusive-has-one-holder invariant.
        fs::write(
            store.record_path(),
            r#"{"mode":"exclusive","holders":{"a":"2026-05-01T08:30:00Z","b":"2026-05-01T08:30:00Z"}}"#,
        )
        .unwrap();
        let err = store.read().unwrap_err();
        assert!(err.to_string().contains("corrupt"));

        fs::write(store.record_path(), r#"{"mode":"shared","holders":{}}"#).unwrap();
        assert!(store.read().is_err());
    }

    #[test]
    fn test_exclusive_releases_lock_even_on_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, "db");

        let result: Result<()> =
            store.exclusive(|_| Err(GrantError::UserError("refused".to_string())));
        assert!(result.is_err());
        assert!(!store.lock_path().exists());

        let value = store.exclusive(|s| {
            assert!(s.lock_path().exists());
            Ok(7)
        });
        assert_eq!(value.unwrap(), 7);
        assert!(!store.lock_path().exists());
    }

    #[test]
    fn test_open_rejects_bad_resource_name() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = StoreContext::at(temp_dir.path());

        let err = FileStore::open(&ctx, "../escape", LockWait::default()).unwrap_err();
        assert!(matches!(err, GrantError::UserError(_)));
    }

    #[test]
    fn test_resources_are_independent() {
        let temp_dir = TempDir::new().unwrap();
        let db = Engine::new(open_store(&temp_dir, "db"), ManualClock::new(Utc::now()));
        let gpu = Engine::new(open_store(&temp_dir, "gpu"), ManualClock::new(Utc::now()));

        db.grant("carol", Mode::Exclusive, "1m").unwrap();
        gpu.grant("dave", Mode::Exclusive, "1m").unwrap();

        assert_eq!(db.status().unwrap().unwrap().holder_names(), vec!["carol"]);
        assert_eq!(gpu.status().unwrap().unwrap().holder_names(), vec!["dave"]);
    }

    #[test]
    fn test_engine_state_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let clock_start = Utc::now();

        let engine = Engine::new(open_store(&temp_dir, "db"), ManualClock::new(clock_start));
        engine.grant("alice", Mode::Shared, "1h").unwrap();
        drop(engine);

        let reopened = Engine::new(open_store(&temp_dir, "db"), ManualClock::new(clock_start));
        let status = reopened.status().unwrap().unwrap();
        assert_eq!(status.mode, Mode::Shared);
        assert_eq!(status.holder_names(), vec!["alice"]);
    }

    #[test]
    fn test_expired_record_file_is_swept_by_status() {
        let temp_dir = TempDir::new().unwrap();
        let engine = Engine::new(open_store(&temp_dir, "db"), ManualClock::new(Utc::now()));

        engine.grant("alice", Mode::Shared, "30s").unwrap();
        assert!(engine.store().record_path().exists());

        engine.clock().advance(Duration::seconds(31));
        assert!(engine.status().unwrap().is_none());
        assert!(!engine.store().record_path().exists());
    }

    #[test]
    fn test_status_does_not_wait_for_a_held_lock() {
        let temp_dir = TempDir::new().unwrap();
        let engine = Engine::new(open_store(&temp_dir, "db"), ManualClock::new(Utc::now()));

        engine.grant("alice", Mode::Shared, "30s").unwrap();
        engine.clock().advance(Duration::seconds(31));
        fs::write(
            engine.store().lock_path(),
            LockMetadata::new("db").to_json().unwrap(),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let (status, swept) = engine.status_with_expired().unwrap();

        assert!(status.is_none());
        assert!(swept.is_empty());
        assert!(started.elapsed() < std::time::Duration::from_millis(500));
        // The expired record stays until a writer gets the lock.
        assert!(engine.store().record_path().exists());
        assert!(engine.store().lock_path().exists());
    }

    #[test]
    fn test_try_exclusive_on_free_lock_runs_and_releases() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, "db");

        let value = store.try_exclusive(|s| {
            assert!(s.lock_path().exists());
            Ok(7)
        });
        assert_eq!(value.unwrap(), Some(7));
        assert!(!store.lock_path().exists());
    }

    #[test]
    fn test_concurrent_processes_get_one_exclusive_grant() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = StoreContext::at(temp_dir.path());
        let wait = LockWait {
            timeout: std::time::Duration::from_secs(10),
            retry: std::time::Duration::from_millis(1),
            stale_minutes: 10,
        };
        let ctx = Arc::new(ctx);

        // Separate stores per thread, like separate processes sharing a state dir.
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ctx = Arc::clone(&ctx);
                std::thread::spawn(move || {
                    let store = FileStore::open(&ctx, "db", wait).unwrap();
                    let engine = Engine::new(store, crate::clock::SystemClock);
                    engine.grant(&format!("worker-{}", i), Mode::Exclusive, "1m")
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(results.iter().all(|r| match r {
            Ok(_) => true,
            Err(e) => matches!(e, GrantError::GrantFailure { .. }),
        }));
    }
}
