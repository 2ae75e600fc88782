//! Implementation of `grantlock --init`.
//!
//! # What `--init` does
//!
//! 1. Creates the state directory with `resources/` and `events/`
//! 2. Writes a commented `config.yaml` template (if missing)
//! 3. Appends an `init` event to the audit log
//!
//! Existing records and config are never touched.

use crate::cli::StoreArgs;
use crate::config::{Config, CONFIG_TEMPLATE};
use crate::context::StoreContext;
use crate::error::{GrantError, Result};
use crate::events::{append_event, Event, EventAction};
use crate::fs::atomic_write;
use serde_json::json;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Execute `grantlock --init`.
///
/// This command is **idempotent**: running it again reports what already
/// exists and changes nothing.
pub fn cmd_init(args: &StoreArgs) -> Result<()> {
    let ctx = StoreContext::resolve(args.state_dir.as_deref())?;
    let summary = init_store(&ctx)?;

    if args.json {
        println!(
            "{}",
            json!({
                "state_dir": ctx.state_dir.display().to_string(),
                "created": summary.created,
                "config_written": summary.config_written,
            })
        );
        return Ok(());
    }

    if summary.created.is_empty() && !summary.config_written {
        println!("Grant store already initialized at {}", ctx.state_dir.display());
        return Ok(());
    }

    println!("Initialized grant store at {}", ctx.state_dir.display());
    println!();
    for dir in &summary.created {
        println!("  created {}/", dir);
    }
    if summary.config_written {
        println!("  wrote   config.yaml");
    }
    println!();
    println!("Request a grant with `grantlock --mode shared --duration 30m`.");

    Ok(())
}

/// What a run of [`init_store`] changed.
#[derive(Debug, Default)]
pub(crate) struct InitSummary {
    /// Directories created, relative to the state dir.
    pub created: Vec<String>,
    pub config_written: bool,
}

/// Create whatever is missing from the store layout.
pub(crate) fn init_store(ctx: &StoreContext) -> Result<InitSummary> {
    let mut summary = InitSummary::default();

    for (label, dir) in [
        (".", &ctx.state_dir),
        ("resources", &ctx.resources_dir),
        ("events", &ctx.events_dir),
    ] {
        if create_dir(dir)? && label != "." {
            summary.created.push(label.to_string());
        }
    }

    let config_path = ctx.config_path();
    if !config_path.exists() {
        atomic_write(&config_path, CONFIG_TEMPLATE.as_bytes())?;
        summary.config_written = true;
    }

    let config = ctx.load_config()?;
    info!(state_dir = %ctx.state_dir.display(), created = ?summary.created, "store initialized");

    if config.audit_log {
        log_init(ctx, &config, &summary);
    }

    Ok(summary)
}

fn log_init(ctx: &StoreContext, config: &Config, summary: &InitSummary) {
    let event = Event::new(EventAction::Init).with_details(json!({
        "state_dir": ctx.state_dir.display().to_string(),
        "created": summary.created,
        "config_written": summary.config_written,
        "default_resource": config.default_resource,
    }));

    if let Err(e) = append_event(ctx, &event) {
        warn!(error = %e, "failed to append init event");
    }
}

/// Create `dir` if needed. Returns whether it was created.
fn create_dir(dir: &Path) -> Result<bool> {
    if dir.is_dir() {
        return Ok(false);
    }

    fs::create_dir_all(dir).map_err(|e| {
        GrantError::StoreError(format!(
            "failed to create directory '{}': {}",
            dir.display(),
            e
        ))
    })?;
    Ok(true)
}
