//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::clock::parse_duration;
use crate::context::validate_resource_name;
use crate::error::{GrantError, Result};
use crate::locks::LockWait;
use chrono::Duration;
use std::path::Path;

/// Commented template written by `grantlock --init`.
pub const CONFIG_TEMPLATE: &str = r#"# grantlock configuration. Every key is optional.

# Resource used when --resource is not given.
default_resource: default

# Longest duration a single grant may request, e.g. "7d". Unset means no limit.
# max_duration: 7d

# How long to wait for another process's store lock, and how often to retry (ms).
lock_timeout_ms: 2000
lock_retry_ms: 20

# Store locks older than this are reported as stale (minutes).
lock_stale_minutes: 10

# Append grant/revoke events to events/events.ndjson.
audit_log: true
"#;

impl Config {
    /// Load config from a YAML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(GrantError::UserError)` - Read error, parse error, or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            GrantError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from a YAML file, using defaults when the file is missing.
    ///
    /// A file that exists but does not parse or validate is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    ///
    /// Unknown fields are silently ignored. An empty document yields defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Option<Config> = serde_yaml::from_str(yaml)
            .map_err(|e| GrantError::UserError(format!("failed to parse config YAML: {}", e)))?;

        let config = config.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Validate config values.
    ///
    /// Validation rules:
    /// - `default_resource` must be a valid resource name
    /// - `lock_timeout_ms`, `lock_retry_ms`, `lock_stale_minutes` must be positive
    /// - `max_duration`, when set, must parse as a duration
    pub fn validate(&self) -> Result<()> {
        validate_resource_name(&self.default_resource).map_err(|e| {
            GrantError::UserError(format!("config validation failed: default_resource: {}", e))
        })?;

        if self.lock_timeout_ms == 0 {
            return Err(GrantError::UserError(
                "config validation failed: lock_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.lock_retry_ms == 0 {
            return Err(GrantError::UserError(
                "config validation failed: lock_retry_ms must be greater than 0".to_string(),
            ));
        }

        if self.lock_stale_minutes == 0 {
            return Err(GrantError::UserError(
                "config validation failed: lock_stale_minutes must be greater than 0".to_string(),
            ));
        }

        self.max_ttl()?;
        Ok(())
    }

    /// The parsed `max_duration`, if configured.
    pub fn max_ttl(&self) -> Result<Option<Duration>> {
        self.max_duration
            .as_deref()
            .map(|raw| {
                parse_duration(raw).map_err(|e| {
                    GrantError::UserError(format!("config validation failed: max_duration: {}", e))
                })
            })
            .transpose()
    }

    /// Lock timing for the file store.
    pub fn lock_wait(&self) -> LockWait {
        LockWait {
            timeout: std::time::Duration::from_millis(self.lock_timeout_ms),
            retry: std::time::Duration::from_millis(self.lock_retry_ms),
            stale_minutes: self.lock_stale_minutes,
        }
    }

    /// `--resource` if given, otherwise `default_resource`, validated.
    pub fn resource_name<'a>(&'a self, requested: Option<&'a str>) -> Result<&'a str> {
        let name = requested.unwrap_or(&self.default_resource);
        validate_resource_name(name)?;
        Ok(name)
    }
}
