//! Store lock files.
//!
//! Each resource's exclusive section is a lock file next to its record
//! (`resources/<name>.lock`). Lock files are created with **create_new**
//! semantics, so at most one process holds a given lock at a time.
//!
//! # Lock Metadata
//!
//! Each lock file contains JSON metadata:
//! - `owner`: who took the lock (`user@HOST`)
//! - `pid`: the process ID (optional)
//! - `created_at`: RFC3339 timestamp
//! - `resource`: the resource whose record is being changed
//!
//! # Waiting
//!
//! A store lock is only held for one read-decide-write, so a busy lock is
//! polled until a deadline instead of failing on first contact. A lock that
//! outlives its process is never broken automatically; it is reported as
//! stale and must be removed with `grantlock --clear-lock --force`.
//!
//! # RAII Guards
//!
//! [`LockGuard`] removes the lock file when dropped. If removal fails, a
//! warning is logged and nothing panics.

use crate::error::{GrantError, Result};
use crate::events::actor_string;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

/// Lock metadata stored in lock files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockMetadata {
    /// Owner of the lock (e.g., `user@HOST`).
    pub owner: String,

    /// Process ID of the lock holder (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    /// Timestamp when the lock was created (RFC3339).
    pub created_at: DateTime<Utc>,

    /// Resource whose record the holder is changing.
    pub resource: String,
}

impl LockMetadata {
    /// Create new lock metadata for `resource` with the current timestamp.
    pub fn new(resource: &str) -> Self {
        Self {
            owner: actor_string(),
            pid: Some(std::process::id()),
            created_at: Utc::now(),
            resource: resource.to_string(),
        }
    }

    /// Parse lock metadata from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            GrantError::StoreError(format!(
                "failed to read lock file '{}': {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            GrantError::StoreError(format!(
                "failed to parse lock file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Serialize lock metadata to JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            GrantError::StoreError(format!("failed to serialize lock metadata: {}", e))
        })
    }

    /// Age of the lock.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.created_at)
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let age = self.age();
        let seconds = age.num_seconds();
        let minutes = age.num_minutes();
        let hours = age.num_hours();

        if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m", minutes)
        } else {
            format!("{}s", seconds.max(0))
        }
    }

    /// Check if the lock is older than `stale_minutes`.
    pub fn is_stale(&self, stale_minutes: u32) -> bool {
        self.age().num_minutes() >= stale_minutes as i64
    }
}

/// How long and how often to retry a busy lock.
#[derive(Debug, Clone, Copy)]
pub struct LockWait {
    pub timeout: std::time::Duration,
    pub retry: std::time::Duration,
    pub stale_minutes: u32,
}

impl Default for LockWait {
    fn default() -> Self {
        Self {
            timeout: std::time::Duration::from_millis(2000),
            retry: std::time::Duration::from_millis(20),
            stale_minutes: 10,
        }
    }
}

/// Information about an existing lock file.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// The lock file path.
    pub path: PathBuf,

    /// The lock metadata.
    pub metadata: LockMetadata,

    /// Whether the lock is stale.
    pub is_stale: bool,
}

impl std::fmt::Display for LockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (owner: {}, age: {}{})",
            self.metadata.resource,
            self.metadata.owner,
            self.metadata.age_string(),
            if self.is_stale { ", STALE" } else { "" }
        )
    }
}

/// RAII guard for a lock file.
///
/// When dropped, the lock file is deleted.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    released: bool,
}

impl LockGuard {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    /// Release the lock now, reporting failure instead of logging it.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        fs::remove_file(&self.path).map_err(|e| {
            GrantError::StoreError(format!(
                "failed to release lock '{}': {}",
                self.path.display(),
                e
            ))
        })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = fs::remove_file(&self.path)
        {
            warn!(path = %self.path.display(), error = %e, "failed to release lock");
        }
    }
}

/// Try once to create `lock_path`.
///
/// # Returns
///
/// * `Ok(Some(LockGuard))` - Lock acquired
/// * `Ok(None)` - The lock file already exists
/// * `Err(GrantError::StoreError)` - Any other I/O failure
pub fn try_acquire(lock_path: &Path, metadata: &LockMetadata) -> Result<Option<LockGuard>> {
    if let Some(parent) = lock_path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            GrantError::StoreError(format!(
                "failed to create lock directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(lock_path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => {
            return Err(GrantError::StoreError(format!(
                "failed to create lock '{}': {}",
                lock_path.display(),
                e
            )));
        }
    };

    // From here on the file is ours; remove it again if the metadata write fails.
    let guard = LockGuard::new(lock_path.to_path_buf());

    let json = metadata.to_json()?;
    file.write_all(json.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| GrantError::StoreError(format!("failed to write lock metadata: {}", e)))?;

    Ok(Some(guard))
}

/// Acquire `lock_path`, polling until `wait.timeout` elapses.
///
/// # Returns
///
/// * `Ok(LockGuard)` - Lock acquired
/// * `Err(GrantError::LockError)` - Still held by someone else at the deadline
pub fn acquire_lock(lock_path: &Path, metadata: &LockMetadata, wait: LockWait) -> Result<LockGuard> {
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if let Some(guard) = try_acquire(lock_path, metadata)? {
            debug!(path = %lock_path.display(), attempts, "store lock acquired");
            return Ok(guard);
        }

        if started.elapsed() >= wait.timeout {
            return Err(busy_error(lock_path, wait));
        }

        std::thread::sleep(wait.retry);
    }
}

fn busy_error(lock_path: &Path, wait: LockWait) -> GrantError {
    let holder = match read_lock(lock_path, wait.stale_minutes) {
        Ok(Some(info)) if info.is_stale => format!(
            "\nHeld by: {}\n\
             If its owner has crashed, run `grantlock --clear-lock --force`.",
            info
        ),
        Ok(Some(info)) => format!("\nHeld by: {}", info),
        _ => String::new(),
    };

    GrantError::LockError(format!(
        "store is locked by another process (waited {}ms)\nLock: {}{}",
        wait.timeout.as_millis(),
        lock_path.display(),
        holder
    ))
}

/// Read the lock at `lock_path`, if any.
pub fn read_lock(lock_path: &Path, stale_minutes: u32) -> Result<Option<LockInfo>> {
    if !lock_path.exists() {
        return Ok(None);
    }

    let metadata = LockMetadata::from_file(lock_path)?;
    let is_stale = metadata.is_stale(stale_minutes);
    Ok(Some(LockInfo {
        path: lock_path.to_path_buf(),
        metadata,
        is_stale,
    }))
}

/// Remove a lock file left behind by another process.
///
/// The caller is responsible for making sure clearing is appropriate
/// (`--force`). Unparsable lock files are removed too, with placeholder
/// metadata in the returned info.
///
/// # Returns
///
/// * `Ok(LockInfo)` - What was removed (for the audit log)
/// * `Err(GrantError::UserError)` - No lock file exists
pub fn clear_lock(lock_path: &Path, resource: &str, stale_minutes: u32) -> Result<LockInfo> {
    if !lock_path.exists() {
        return Err(GrantError::UserError(format!(
            "no store lock for resource '{}' at: {}",
            resource,
            lock_path.display()
        )));
    }

    let info = match read_lock(lock_path, stale_minutes) {
        Ok(Some(info)) => info,
        _ => LockInfo {
            path: lock_path.to_path_buf(),
            metadata: LockMetadata {
                owner: "unknown".to_string(),
                pid: None,
                created_at: Utc::now(),
                resource: resource.to_string(),
            },
            is_stale: false,
        },
    };

    fs::remove_file(lock_path).map_err(|e| {
        GrantError::StoreError(format!(
            "failed to clear lock '{}': {}",
            lock_path.display(),
            e
        ))
    })?;

    Ok(info)
}
