//! Time source and duration parsing.
//!
//! The engine never calls `Utc::now()` directly; it asks a [`Clock`], so tests
//! can drive expiry with a [`ManualClock`].
//!
//! # Duration Grammar
//!
//! One or more `<integer><unit>` pieces, optionally separated by whitespace:
//! `45s`, `30m`, `1h`, `1h30m`, `2 days`. Units are case-insensitive:
//! - seconds: `s`, `sec`, `secs`, `second`, `seconds`
//! - minutes: `m`, `min`, `mins`, `minute`, `minutes`
//! - hours: `h`, `hr`, `hrs`, `hour`, `hours`
//! - days: `d`, `day`, `days`
//! - weeks: `w`, `week`, `weeks`

use crate::error::{GrantError, Result};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::sync::{LazyLock, Mutex};

/// Unit alternation, longest spellings first so `min` is not read as `m` + `in`.
const UNIT_PATTERN: &str =
    r"seconds|second|secs|sec|s|minutes|minute|mins|min|m|hours|hour|hrs|hr|h|days|day|d|weeks|week|w";

static DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^(?:\s*[0-9]+\s*(?:{UNIT_PATTERN}))+\s*$"))
        .expect("Invalid duration regex")
});

static PIECE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)([0-9]+)\s*({UNIT_PATTERN})")).expect("Invalid duration piece regex")
});

/// Source of the current time.
pub trait Clock {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[allow(dead_code)]
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

#[allow(dead_code)]
impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poison| poison.into_inner());
        *now += by;
    }

    /// Jump to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|poison| poison.into_inner());
        *now = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

/// Parse a human duration such as `30m` or `1h30m`.
///
/// # Returns
///
/// * `Ok(Duration)` - A strictly positive duration
/// * `Err(GrantError::UserError)` - Malformed, zero, or out-of-range input
pub fn parse_duration(input: &str) -> Result<Duration> {
    if !DURATION_REGEX.is_match(input) {
        return Err(GrantError::UserError(format!(
            "invalid duration '{}': expected a number followed by a unit, e.g. 45s, 30m, 1h or 1h30m",
            input
        )));
    }

    let out_of_range =
        || GrantError::UserError(format!("invalid duration '{}': value is too large", input));

    let mut total = Duration::zero();
    for piece in PIECE_REGEX.captures_iter(input) {
        let amount: i64 = piece[1].parse().map_err(|_| out_of_range())?;
        let unit_seconds = unit_seconds(&piece[2].to_ascii_lowercase());
        let seconds = amount.checked_mul(unit_seconds).ok_or_else(out_of_range)?;
        let part = Duration::try_seconds(seconds).ok_or_else(out_of_range)?;
        total = total.checked_add(&part).ok_or_else(out_of_range)?;
    }

    if total <= Duration::zero() {
        return Err(GrantError::UserError(format!(
            "invalid duration '{}': must be greater than zero",
            input
        )));
    }

    Ok(total)
}

fn unit_seconds(unit: &str) -> i64 {
    match unit.chars().next() {
        Some('s') => 1,
        Some('m') => 60,
        Some('h') => 60 * 60,
        Some('d') => 24 * 60 * 60,
        _ => 7 * 24 * 60 * 60,
    }
}

/// Compute the absolute expiry for a grant of `ttl` starting at `now`.
pub fn expires_at(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
    now.checked_add_signed(ttl).ok_or_else(|| {
        GrantError::UserError(format!(
            "duration of {}s puts the expiry out of range",
            ttl.num_seconds()
        ))
    })
}

/// Format the time left until `until` as a short human string (`1h 5m`, `42s`).
pub fn remaining_string(now: DateTime<Utc>, until: DateTime<Utc>) -> String {
    let left = until.signed_duration_since(now);
    if left <= Duration::zero() {
        return "expired".to_string();
    }

    let seconds = left.num_seconds();
    let minutes = left.num_minutes();
    let hours = left.num_hours();
    let days = left.num_days();

    if days > 0 {
        format!("{}d {}h", days, hours % 24)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}
