//! Implementation of `grantlock --clear-lock`.

use super::Target;
use crate::cli::StoreArgs;
use crate::error::{GrantError, Result};
use crate::events::{Event, EventAction};
use crate::locks;
use serde_json::json;

/// Execute `grantlock --clear-lock --force`.
///
/// Only the store lock of the resource is removed; its grant record is left
/// as it is.
pub fn cmd_clear_lock(args: &StoreArgs, force: bool) -> Result<()> {
    if !force {
        return Err(GrantError::UserError(
            "refusing to clear the store lock without --force.\n\n\
             Clearing a lock that is still held can let two processes change the same record.\n\
             Only clear it if the process that took it has crashed.\n\n\
             To clear the lock, run:\n  grantlock --clear-lock --force"
                .to_string(),
        ));
    }

    let target = Target::open(args)?;
    let engine = target.engine()?;
    let cleared = locks::clear_lock(
        engine.store().lock_path(),
        &target.resource,
        target.config.lock_stale_minutes,
    )?;

    target.record(Event::new(EventAction::LockClear).with_details(json!({
        "age_minutes": cleared.metadata.age().num_minutes(),
        "was_stale": cleared.is_stale,
        "owner": cleared.metadata.owner,
        "pid": cleared.metadata.pid,
    })));

    if args.json {
        println!(
            "{}",
            json!({
                "resource": target.resource,
                "path": cleared.path.display().to_string(),
                "owner": cleared.metadata.owner,
                "pid": cleared.metadata.pid,
                "created_at": cleared.metadata.created_at,
                "was_stale": cleared.is_stale,
            })
        );
        return Ok(());
    }

    println!("Cleared store lock for '{}'.", target.resource);
    println!();
    println!("Lock details:");
    println!("  Owner:      {}", cleared.metadata.owner);
    if let Some(pid) = cleared.metadata.pid {
        println!("  PID:        {}", pid);
    }
    println!(
        "  Created:    {}",
        cleared.metadata.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  Age:        {}", cleared.metadata.age_string());
    if cleared.is_stale {
        println!("  Status:     was STALE");
    }
    println!("  Path:       {}", cleared.path.display());

    Ok(())
}
