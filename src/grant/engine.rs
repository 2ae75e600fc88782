//! The engine: store + clock + decisions.

use super::decision::{decide_grant, decide_revoke, GrantKind};
use super::model::{validate_holder, Mode, Status};
use crate::clock::{self, Clock};
use crate::error::{GrantError, Result};
use crate::store::Store;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Outcome of a successful grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grant {
    pub holder: String,
    pub mode: Mode,
    pub expires_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: GrantKind,
    /// Holders dropped from the record because their grant had expired.
    pub expired: Vec<String>,
}

/// Outcome of a revoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Revoke {
    pub holder: String,
    /// Whether the holder had a live grant that was removed.
    pub released: bool,
    /// Live holders left afterwards; zero means the resource is free.
    pub remaining: usize,
    pub expired: Vec<String>,
}

/// Grant engine for a single resource.
///
/// Owns its store and clock. Every mutating operation runs inside the store's
/// exclusive section, so concurrent callers sharing an engine (or separate
/// processes sharing a file store) never interleave read and write.
#[derive(Debug)]
pub struct Engine<S, C> {
    store: S,
    clock: C,
    max_ttl: Option<Duration>,
}

impl<S: Store, C: Clock> Engine<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            max_ttl: None,
        }
    }

    /// Refuse grants longer than `max`.
    pub fn with_max_duration(mut self, max: Duration) -> Self {
        self.max_ttl = Some(max);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[allow(dead_code)]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Grant `holder` access in `mode` for a human duration such as `30m`.
    ///
    /// An unparsable duration is a [`GrantError::UserError`], not an engine
    /// refusal.
    pub fn grant(&self, holder: &str, mode: Mode, duration: &str) -> Result<Grant> {
        let ttl = clock::parse_duration(duration)?;
        self.grant_for(holder, mode, ttl)
    }

    /// Grant `holder` access in `mode` for `ttl`.
    ///
    /// Nothing is written when the request is refused.
    pub fn grant_for(&self, holder: &str, mode: Mode, ttl: Duration) -> Result<Grant> {
        validate_holder(holder)?;
        self.check_ttl(ttl)?;

        self.store.exclusive(|store| {
            let now = self.clock.now();
            let expires_at = clock::expires_at(now, ttl)?;

            let current = store.read()?;
            let expired = current
                .as_ref()
                .map(|record| record.expired_holders(now))
                .unwrap_or_default();
            let live = current.and_then(|record| record.into_live(now));

            debug!(
                holder,
                %mode,
                current = ?live.as_ref().map(|record| record.mode),
                holders = live.as_ref().map_or(0, |record| record.holders.len()),
                "deciding grant"
            );

            let (next, kind) = decide_grant(live, holder, mode, expires_at)?;
            store.write(Some(&next))?;

            info!(holder, %mode, %expires_at, ?kind, "grant recorded");
            Ok(Grant {
                holder: holder.to_string(),
                mode,
                expires_at,
                kind,
                expired,
            })
        })
    }

    /// Remove `holder`'s grant.
    ///
    /// Revoking someone who holds nothing, or revoking on a free resource,
    /// succeeds without changing anything. The mode of the remaining holders
    /// is never changed.
    pub fn revoke(&self, holder: &str) -> Result<Revoke> {
        validate_holder(holder)?;

        self.store.exclusive(|store| {
            let now = self.clock.now();
            let current = store.read()?;
            let Some(record) = current else {
                debug!(holder, "revoke on free resource");
                return Ok(Revoke {
                    holder: holder.to_string(),
                    released: false,
                    remaining: 0,
                    expired: Vec::new(),
                });
            };

            let expired = record.expired_holders(now);
            let before = record.clone();
            let (next, released) = decide_revoke(record.into_live(now), holder);

            if next.as_ref() != Some(&before) {
                store.write(next.as_ref())?;
            }

            let remaining = next.as_ref().map_or(0, |record| record.holders.len());
            if released {
                info!(holder, remaining, "grant revoked");
            } else {
                debug!(holder, "revoke of non-holder");
            }

            Ok(Revoke {
                holder: holder.to_string(),
                released,
                remaining,
                expired,
            })
        })
    }

    /// Live view of the resource, or `None` when it is free.
    ///
    /// See [`Engine::status_with_expired`] for the cleanup it does.
    #[allow(dead_code)]
    pub fn status(&self) -> Result<Option<Status>> {
        self.status_with_expired().map(|(status, _)| status)
    }

    /// Live view of the resource, plus the expired holders it swept.
    ///
    /// The sweep is best-effort and never waits for the store lock: when
    /// another writer is inside, the record is left as it is and nothing is
    /// reported. A failed sweep is logged and does not fail the query.
    pub fn status_with_expired(&self) -> Result<(Option<Status>, Vec<String>)> {
        let Some(record) = self.store.read()? else {
            return Ok((None, Vec::new()));
        };

        let now = self.clock.now();
        let mut swept = Vec::new();
        if !record.expired_holders(now).is_empty() {
            match self.try_sweep() {
                Ok(Some(expired)) => swept = expired,
                Ok(None) => debug!("store busy; expired holders left for the next writer"),
                Err(e) => warn!(error = %e, "failed to sweep expired holders"),
            }
        }

        Ok((record.into_live(now).map(Status::from), swept))
    }

    /// Persist the expiry filter: drop every expired holder from the store.
    ///
    /// Returns the holders that were dropped.
    #[allow(dead_code)]
    pub fn sweep(&self) -> Result<Vec<String>> {
        self.store.exclusive(|store| self.sweep_locked(store))
    }

    /// [`Engine::sweep`] without waiting; `None` when the store is busy.
    pub fn try_sweep(&self) -> Result<Option<Vec<String>>> {
        self.store.try_exclusive(|store| self.sweep_locked(store))
    }

    fn sweep_locked(&self, store: &S) -> Result<Vec<String>> {
        let now = self.clock.now();
        let Some(record) = store.read()? else {
            return Ok(Vec::new());
        };

        let expired = record.expired_holders(now);
        if expired.is_empty() {
            return Ok(expired);
        }

        let live = record.into_live(now);
        store.write(live.as_ref())?;
        info!(expired = ?expired, free = live.is_none(), "swept expired holders");
        Ok(expired)
    }

    fn check_ttl(&self, ttl: Duration) -> Result<()> {
        if ttl <= Duration::zero() {
            return Err(GrantError::UserError(
                "grant duration must be greater than zero".to_string(),
            ));
        }

        if let Some(max) = self.max_ttl
            && ttl > max
        {
            return Err(GrantError::UserError(format!(
                "grant duration of {}s exceeds the configured maximum of {}s",
                ttl.num_seconds(),
                max.num_seconds()
            )));
        }

        Ok(())
    }
}
