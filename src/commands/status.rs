//! Implementation of `grantlock --status`.
//!
//! Prints the live holders of the resource, or that it is free. Expired
//! holders are never shown; the ones swept from the record are logged as an
//! `expire` event.

use super::Target;
use crate::cli::StoreArgs;
use crate::clock::remaining_string;
use crate::error::Result;
use crate::grant::Status;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Execute `grantlock --status`.
pub fn cmd_status(args: &StoreArgs) -> Result<()> {
    let target = Target::open(args)?;
    let (status, expired) = target.engine()?.status_with_expired()?;
    super::grant::log_expired(&target, &expired);

    if args.json {
        println!("{}", status_json(&target.resource, status.as_ref()));
    } else {
        print!("{}", render_status(&target.resource, status.as_ref(), Utc::now()));
    }

    Ok(())
}

/// `{resource, mode, holders: [{holder, expires_at}]}`; `mode` is null when free.
fn status_json(resource: &str, status: Option<&Status>) -> Value {
    let holders: Vec<Value> = status
        .map(|status| {
            status
                .holders
                .iter()
                .map(|(holder, expires_at)| json!({ "holder": holder, "expires_at": expires_at }))
                .collect()
        })
        .unwrap_or_default();

    json!({
        "resource": resource,
        "mode": status.map(|status| status.mode),
        "holders": holders,
    })
}

fn render_status(resource: &str, status: Option<&Status>, now: DateTime<Utc>) -> String {
    let Some(status) = status else {
        return format!("Resource '{}' is free.\n", resource);
    };

    let width = status
        .holder_names()
        .iter()
        .map(|holder| holder.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    out.push_str(&format!("Resource: {}\n", resource));
    out.push_str(&format!("Mode:     {}\n", status.mode));
    out.push_str(&format!("Holders ({}):\n", status.holders.len()));
    for (holder, expires_at) in &status.holders {
        out.push_str(&format!(
            "  {:width$}  expires {} (in {})\n",
            holder,
            expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
            remaining_string(now, *expires_at),
            width = width
        ));
    }
    out
}
