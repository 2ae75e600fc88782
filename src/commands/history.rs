//! Implementation of `grantlock --history [N]`.
//!
//! Shows the tail of the audit log for the resource, including store-wide
//! events such as `init`.

use super::Target;
use crate::cli::StoreArgs;
use crate::error::{GrantError, Result};
use crate::events::{read_events, Event};

/// Execute `grantlock --history [N]`.
pub fn cmd_history(args: &StoreArgs, limit: usize) -> Result<()> {
    let target = Target::open(args)?;
    let events = read_events(&target.ctx)?;
    let tail = tail_for_resource(&events, &target.resource, limit);

    if args.json {
        for event in tail {
            println!("{}", event.to_ndjson_line()?);
        }
        return Ok(());
    }

    if tail.is_empty() {
        println!("No events recorded for '{}'.", target.resource);
        return Ok(());
    }

    for event in tail {
        println!("{}", format_event(event)?);
    }

    Ok(())
}

/// The last `limit` events that concern `resource`, oldest first.
fn tail_for_resource<'a>(events: &'a [Event], resource: &str, limit: usize) -> Vec<&'a Event> {
    let matching: Vec<&Event> = events
        .iter()
        .filter(|event| event.resource.as_deref().is_none_or(|r| r == resource))
        .collect();

    let skip = matching.len().saturating_sub(limit);
    matching.into_iter().skip(skip).collect()
}

fn format_event(event: &Event) -> Result<String> {
    let details = serde_json::to_string(&event.details)
        .map_err(|e| GrantError::StoreError(format!("failed to serialize event details: {}", e)))?;

    Ok(format!(
        "{}  {:<12}  {:<16}  by {}  {}",
        event.ts.format("%Y-%m-%d %H:%M:%S"),
        event.action.to_string(),
        event.holder.as_deref().unwrap_or("-"),
        event.actor,
        details
    ))
}
