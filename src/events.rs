//! Audit log for grantlock.
//!
//! Every state change is appended to `{state_dir}/events/events.ndjson`, one
//! JSON object per line.
//!
//! # Event Format
//!
//! - `ts`: RFC3339 timestamp
//! - `action`: `init`, `grant`, `grant_denied`, `revoke`, `expire`, `lock_clear`
//! - `actor`: the invoking identity (`user@HOST`)
//! - `resource`: resource name (absent for store-wide events)
//! - `holder`: holder the event is about (optional)
//! - `details`: freeform object with action-specific details
//!
//! Events are written after the store operation they describe. The audit log
//! is not the source of truth, so callers treat append failures as warnings.

use crate::context::StoreContext;
use crate::error::{GrantError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Store initialized
    Init,
    /// Grant acquired, joined, renewed, or converted
    Grant,
    /// Grant refused (GrantFailure or UpgradeFailure)
    GrantDenied,
    /// Grant revoked
    Revoke,
    /// Expired holders dropped from a record
    Expire,
    /// Store lock cleared manually
    LockClear,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Init => write!(f, "init"),
            EventAction::Grant => write!(f, "grant"),
            EventAction::GrantDenied => write!(f, "grant_denied"),
            EventAction::Revoke => write!(f, "revoke"),
            EventAction::Expire => write!(f, "expire"),
            EventAction::LockClear => write!(f, "lock_clear"),
        }
    }
}

/// An event record for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub ts: DateTime<Utc>,

    pub action: EventAction,

    /// Who ran the command (e.g., `user@HOST`).
    pub actor: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<String>,

    pub details: Value,
}

impl Event {
    /// Create a new event stamped with the current time and actor.
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: actor_string(),
            resource: None,
            holder: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = Some(holder.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| GrantError::StoreError(format!("failed to serialize event: {}", e)))
    }
}

/// `user@HOST` of the invoking process.
pub fn actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Append an event to the audit log, creating the file if needed.
pub fn append_event(ctx: &StoreContext, event: &Event) -> Result<()> {
    let events_file = ctx.events_file();
    let json_line = event.to_ndjson_line()?;

    if !ctx.events_dir.exists() {
        fs::create_dir_all(&ctx.events_dir).map_err(|e| {
            GrantError::StoreError(format!(
                "failed to create events directory '{}': {}",
                ctx.events_dir.display(),
                e
            ))
        })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&events_file)
        .map_err(|e| {
            GrantError::StoreError(format!(
                "failed to open events file '{}': {}",
                events_file.display(),
                e
            ))
        })?;

    // A single write per line keeps concurrent appenders from interleaving.
    file.write_all(format!("{}\n", json_line).as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| {
            GrantError::StoreError(format!(
                "failed to write event to '{}': {}",
                events_file.display(),
                e
            ))
        })
}

/// Read back every event in the audit log.
///
/// Lines that fail to parse are skipped.
pub fn read_events(ctx: &StoreContext) -> Result<Vec<Event>> {
    let events_file = ctx.events_file();
    if !events_file.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&events_file).map_err(|e| {
        GrantError::StoreError(format!(
            "failed to read events file '{}': {}",
            events_file.display(),
            e
        ))
    })?;

    Ok(content
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}
