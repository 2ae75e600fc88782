//! Atomic file replacement.
//!
//! All writes follow this pattern:
//! 1. Write content to a temporary file in the same directory
//! 2. Sync the file to disk (fsync)
//! 3. Rename it over the target
//!
//! Rename is atomic when source and target are on the same filesystem, which
//! holds because the temporary file lives next to the target. A reader sees
//! either the old record or the new one, never a mix.
//!
//! On crash, a temporary file may remain (named `.{filename}.{pid}.tmp`).

use crate::error::{GrantError, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Atomically replace `path` with `content`.
///
/// # Returns
///
/// * `Ok(())` - The target now holds exactly `content`
/// * `Err(GrantError::StoreError)` - Write, sync, or rename failed; the target is untouched
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            GrantError::StoreError(format!(
                "failed to create directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let temp_path = temp_path_for(path)?;
    write_and_sync(&temp_path, content)?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        GrantError::StoreError(format!(
            "failed to atomically replace '{}': {}",
            path.display(),
            e
        ))
    })?;

    // Persist the directory entry as well (directories cannot be opened on Windows).
    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}

/// Remove `path`, treating a missing file as success.
pub fn remove_if_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(GrantError::StoreError(format!(
            "failed to remove '{}': {}",
            path.display(),
            e
        ))),
    }
}

/// Temporary file next to `target`, unique per process.
///
/// Writers of the same record are already serialized by the store lock; the
/// pid only keeps an unlocked writer from clobbering a locked one's temp file.
fn temp_path_for(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            GrantError::StoreError(format!("invalid file path '{}'", target.display()))
        })?;

    Ok(parent.join(format!(".{}.{}.tmp", filename, std::process::id())))
}

fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        GrantError::StoreError(format!(
            "failed to create temporary file '{}': {}",
            path.display(),
            e
        ))
    })?;

    file.write_all(content)
        .and_then(|()| file.sync_all())
        .map_err(|e| {
            let _ = fs::remove_file(path);
            GrantError::StoreError(format!(
                "failed to write temporary file '{}': {}",
                path.display(),
                e
            ))
        })
}
