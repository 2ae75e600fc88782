//! Configuration model for grantlock.

use serde::{Deserialize, Serialize};

/// Configuration of a grant store.
///
/// This struct represents the contents of `{state_dir}/config.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Resource settings
    // =========================================================================
    /// Resource used when `--resource` is not given.
    #[serde(default = "default_resource")]
    pub default_resource: String,

    /// Longest duration a single grant may request (e.g. `7d`). Unset means no limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<String>,

    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Maximum time to wait for the store lock, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Interval between attempts while waiting for the store lock, in milliseconds.
    #[serde(default = "default_lock_retry_ms")]
    pub lock_retry_ms: u64,

    /// Minutes after which a store lock is reported as stale.
    #[serde(default = "default_lock_stale_minutes")]
    pub lock_stale_minutes: u32,

    // =========================================================================
    // Audit settings
    // =========================================================================
    /// Whether to append events to the audit log.
    #[serde(default = "default_true")]
    pub audit_log: bool,
}

fn default_resource() -> String {
    "default".to_string()
}
fn default_lock_timeout_ms() -> u64 {
    2000
}
fn default_lock_retry_ms() -> u64 {
    20
}
fn default_lock_stale_minutes() -> u32 {
    10
}
fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_resource: default_resource(),
            max_duration: None,
            lock_timeout_ms: default_lock_timeout_ms(),
            lock_retry_ms: default_lock_retry_ms(),
            lock_stale_minutes: default_lock_stale_minutes(),
            audit_log: default_true(),
        }
    }
}
