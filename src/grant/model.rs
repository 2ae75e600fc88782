//! Grant record and status types.

use crate::error::{GrantError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Access mode of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Any number of holders may hold the resource together.
    Shared,
    /// Exactly one holder.
    Exclusive,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Shared => "shared",
            Mode::Exclusive => "exclusive",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted state of one resource.
///
/// A record only exists while someone holds the resource; a free resource
/// has no record at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    /// Current mode.
    pub mode: Mode,

    /// Holder identity to absolute expiry.
    pub holders: BTreeMap<String, DateTime<Utc>>,
}

impl GrantRecord {
    /// A record with a single holder.
    pub fn new(mode: Mode, holder: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        let mut holders = BTreeMap::new();
        holders.insert(holder.into(), expires_at);
        Self { mode, holders }
    }

    /// Whether `holder` is in the record (expired or not).
    pub fn holds(&self, holder: &str) -> bool {
        self.holders.contains_key(holder)
    }

    /// Names of holders whose expiry has passed at `now`.
    pub fn expired_holders(&self, now: DateTime<Utc>) -> Vec<String> {
        self.holders
            .iter()
            .filter(|(_, expires_at)| **expires_at <= now)
            .map(|(holder, _)| holder.clone())
            .collect()
    }

    /// Drop expired holders.
    ///
    /// Returns `None` when nobody is left, which is how a free resource is
    /// represented.
    pub fn into_live(mut self, now: DateTime<Utc>) -> Option<Self> {
        self.holders.retain(|_, expires_at| *expires_at > now);
        if self.holders.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    /// Live holders other than `holder`.
    pub fn others(&self, holder: &str) -> Vec<String> {
        self.holders
            .keys()
            .filter(|name| name.as_str() != holder)
            .cloned()
            .collect()
    }

    /// Check the structural invariants of a persisted record.
    ///
    /// - at least one holder
    /// - exclusive records have exactly one holder
    pub fn validate(&self) -> Result<()> {
        if self.holders.is_empty() {
            return Err(GrantError::StoreError(
                "grant record has no holders; a free resource must have no record".to_string(),
            ));
        }

        if self.mode == Mode::Exclusive && self.holders.len() != 1 {
            return Err(GrantError::StoreError(format!(
                "exclusive grant record has {} holders ({}); expected exactly one",
                self.holders.len(),
                self.holders.keys().cloned().collect::<Vec<_>>().join(", ")
            )));
        }

        if let Some(name) = self.holders.keys().find(|name| validate_holder(name).is_err()) {
            return Err(GrantError::StoreError(format!(
                "grant record contains invalid holder name {:?}",
                name
            )));
        }

        Ok(())
    }
}

/// Read-only view of a held resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub mode: Mode,
    pub holders: BTreeMap<String, DateTime<Utc>>,
}

impl Status {
    /// Holder names in sorted order.
    pub fn holder_names(&self) -> Vec<&str> {
        self.holders.keys().map(String::as_str).collect()
    }

    #[allow(dead_code)]
    pub fn expires_at(&self, holder: &str) -> Option<DateTime<Utc>> {
        self.holders.get(holder).copied()
    }
}

impl From<GrantRecord> for Status {
    fn from(record: GrantRecord) -> Self {
        Self {
            mode: record.mode,
            holders: record.holders,
        }
    }
}

/// Validate a holder identity.
///
/// Holders must be non-blank and free of control characters, since the name
/// is printed in status output and stored as a JSON key.
pub fn validate_holder(holder: &str) -> Result<()> {
    if holder.trim().is_empty() {
        return Err(GrantError::UserError(
            "holder name must not be empty".to_string(),
        ));
    }

    if holder.chars().any(char::is_control) {
        return Err(GrantError::UserError(format!(
            "holder name {:?} must not contain control characters",
            holder
        )));
    }

    Ok(())
}
