//! State directory resolution for grantlock.
//!
//! Every command locates its store through [`StoreContext`], so all callers
//! that agree on a state directory coordinate on the same records and locks.
//!
//! # Resolution Order
//!
//! 1. `--state-dir DIR`
//! 2. the `GRANTLOCK_STATE_DIR` environment variable
//! 3. `.grantlock/` in the current working directory
//!
//! # Layout
//!
//! ```text
//! {state_dir}/
//!   config.yaml
//!   resources/{name}.json
//!   resources/{name}.lock
//!   events/events.ndjson
//! ```

use crate::config::Config;
use crate::error::{GrantError, Result};
use regex::Regex;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Environment variable naming the state directory.
pub const STATE_DIR_ENV: &str = "GRANTLOCK_STATE_DIR";

/// Default state directory, relative to the working directory.
pub const DEFAULT_STATE_DIR: &str = ".grantlock";

static RESOURCE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").expect("Invalid resource name regex")
});

/// Resolved paths of a grant store.
///
/// All paths are absolute.
#[derive(Debug, Clone)]
pub struct StoreContext {
    /// Root of the store.
    pub state_dir: PathBuf,

    /// Directory holding one record (and transient lock) per resource.
    pub resources_dir: PathBuf,

    /// Directory holding the audit log.
    pub events_dir: PathBuf,
}

impl StoreContext {
    /// Resolve the store location from an explicit directory, the
    /// environment, or the working directory, in that order.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| {
            GrantError::UserError(format!("failed to get current working directory: {}", e))
        })?;

        let chosen = match explicit {
            Some(dir) => dir.to_path_buf(),
            None => match env::var_os(STATE_DIR_ENV) {
                Some(dir) if !dir.is_empty() => PathBuf::from(dir),
                _ => PathBuf::from(DEFAULT_STATE_DIR),
            },
        };

        let state_dir = if chosen.is_absolute() {
            chosen
        } else {
            cwd.join(chosen)
        };

        Ok(Self::at(state_dir))
    }

    /// Context rooted at `state_dir` with the fixed layout.
    pub fn at<P: Into<PathBuf>>(state_dir: P) -> Self {
        let state_dir = state_dir.into();
        let resources_dir = state_dir.join("resources");
        let events_dir = state_dir.join("events");

        Self {
            state_dir,
            resources_dir,
            events_dir,
        }
    }

    /// Check if `--init` has been run for this store.
    pub fn is_initialized(&self) -> bool {
        self.state_dir.is_dir() && self.resources_dir.is_dir()
    }

    /// Ensure the store is initialized, returning an error if not.
    ///
    /// Called by every command except `--init`.
    pub fn ensure_initialized(&self) -> Result<()> {
        if !self.is_initialized() {
            return Err(GrantError::UserError(format!(
                "grant store not initialized.\n\
                 Expected store at: {}\n\n\
                 Run `grantlock --init` (optionally with --state-dir) to create it.",
                self.state_dir.display()
            )));
        }

        Ok(())
    }

    /// Path to `config.yaml`.
    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join("config.yaml")
    }

    /// Load `config.yaml`, using defaults when it does not exist.
    pub fn load_config(&self) -> Result<Config> {
        Config::load_or_default(self.config_path())
    }

    /// Path to the record of `resource`.
    pub fn record_path(&self, resource: &str) -> PathBuf {
        self.resources_dir.join(format!("{}.json", resource))
    }

    /// Path to the store lock of `resource`.
    pub fn lock_path(&self, resource: &str) -> PathBuf {
        self.resources_dir.join(format!("{}.lock", resource))
    }

    /// Path to the audit log.
    pub fn events_file(&self) -> PathBuf {
        self.events_dir.join("events.ndjson")
    }
}

/// Resolve the store and require it to be initialized.
pub fn require_initialized_store(explicit: Option<&Path>) -> Result<StoreContext> {
    let ctx = StoreContext::resolve(explicit)?;
    ctx.ensure_initialized()?;
    Ok(ctx)
}

/// Validate a resource name.
///
/// Names become file names, so they are restricted to
/// `[A-Za-z0-9][A-Za-z0-9._-]*` (at most 128 characters).
pub fn validate_resource_name(name: &str) -> Result<()> {
    if RESOURCE_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(GrantError::UserError(format!(
            "invalid resource name '{}': use letters, digits, '.', '_' or '-', starting with a letter or digit",
            name
        )))
    }
}

/// The identity of the invoking OS user.
pub fn current_user() -> Result<String> {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .ok()
        .filter(|user| !user.trim().is_empty())
        .ok_or_else(|| {
            GrantError::UserError(
                "could not determine the current user from USER or USERNAME; pass --user NAME"
                    .to_string(),
            )
        })
}
