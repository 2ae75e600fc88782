//! Pure grant/revoke decisions.
//!
//! These functions take the *live* record (expired holders already removed)
//! and produce the next record. They never touch the store, which keeps the
//! mode rules testable without any I/O.

use super::model::{GrantRecord, Mode};
use crate::error::{GrantError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// How a successful grant changed the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrantKind {
    /// The resource was free; the holder is now its only holder.
    Acquired,
    /// A new holder joined existing shared holders.
    Joined,
    /// An existing holder asked for the mode it already holds; expiry refreshed.
    Renewed,
    /// The sole live holder switched mode.
    Converted { from: Mode },
}

/// Decide the record that results from `holder` asking for `requested` until
/// `expires_at`.
///
/// Rules, in order:
/// - free resource: the holder takes it in the requested mode
/// - new holder: may only join when both sides are shared
/// - existing holder, same mode: expiry refreshed unconditionally
/// - existing holder, other mode: allowed only when it is the sole holder
pub fn decide_grant(
    live: Option<GrantRecord>,
    holder: &str,
    requested: Mode,
    expires_at: DateTime<Utc>,
) -> Result<(GrantRecord, GrantKind)> {
    let Some(mut record) = live else {
        return Ok((
            GrantRecord::new(requested, holder, expires_at),
            GrantKind::Acquired,
        ));
    };

    if !record.holds(holder) {
        if record.mode == Mode::Shared && requested == Mode::Shared {
            record.holders.insert(holder.to_string(), expires_at);
            return Ok((record, GrantKind::Joined));
        }

        return Err(GrantError::GrantFailure {
            holder: holder.to_string(),
            requested,
            current: record.mode,
            held_by: record.holders.keys().cloned().collect(),
        });
    }

    if record.mode == requested {
        record.holders.insert(holder.to_string(), expires_at);
        return Ok((record, GrantKind::Renewed));
    }

    let others = record.others(holder);
    if !others.is_empty() {
        return Err(GrantError::UpgradeFailure {
            holder: holder.to_string(),
            requested,
            current: record.mode,
            others,
        });
    }

    let from = record.mode;
    Ok((
        GrantRecord::new(requested, holder, expires_at),
        GrantKind::Converted { from },
    ))
}

/// Decide the record that results from revoking `holder`.
///
/// Returns the next record (`None` when the resource becomes free) and
/// whether the holder was actually present.
pub fn decide_revoke(live: Option<GrantRecord>, holder: &str) -> (Option<GrantRecord>, bool) {
    let Some(mut record) = live else {
        return (None, false);
    };

    let released = record.holders.remove(holder).is_some();
    if record.holders.is_empty() {
        (None, released)
    } else {
        (Some(record), released)
    }
}
