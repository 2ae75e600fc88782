//! Command implementations for grantlock.
//!
//! This module provides the dispatcher that routes the selected CLI action
//! to its implementation, plus the setup every store-backed action shares:
//! resolve the state directory, load config, pick the resource, build the
//! engine.

mod grant;
mod history;
mod init;
mod lock;
mod status;

use crate::cli::{Action, Cli, StoreArgs};
use crate::clock::SystemClock;
use crate::config::Config;
use crate::context::{current_user, require_initialized_store, StoreContext};
use crate::error::{GrantError, Result};
use crate::events::{append_event, Event};
use crate::grant::Engine;
use crate::store::FileStore;
use tracing::{debug, warn};

/// Dispatch the selected action to its implementation.
pub fn dispatch(cli: Cli) -> Result<()> {
    let Some(action) = cli.action() else {
        return Err(GrantError::UserError(
            "no action given; use one of --status, --mode, --revoke, --init, --clear-lock, --history"
                .to_string(),
        ));
    };

    match action {
        Action::Init => init::cmd_init(&cli.store),
        Action::Status => status::cmd_status(&cli.store),
        Action::Grant { mode, duration } => {
            let holder = holder_or_current_user(cli.user)?;
            grant::cmd_grant(&cli.store, &holder, mode, &duration)
        }
        Action::Revoke => {
            let holder = holder_or_current_user(cli.user)?;
            grant::cmd_revoke(&cli.store, &holder)
        }
        Action::ClearLock { force } => lock::cmd_clear_lock(&cli.store, force),
        Action::History { limit } => history::cmd_history(&cli.store, limit),
    }
}

fn holder_or_current_user(user: Option<String>) -> Result<String> {
    match user {
        Some(user) => Ok(user),
        None => current_user(),
    }
}

/// Everything an action needs to know about where it operates.
#[derive(Debug)]
struct Target {
    ctx: StoreContext,
    config: Config,
    resource: String,
}

impl Target {
    /// Resolve an initialized store and the resource to act on.
    fn open(args: &StoreArgs) -> Result<Self> {
        let ctx = require_initialized_store(args.state_dir.as_deref())?;
        let config = ctx.load_config()?;
        let resource = config.resource_name(args.resource.as_deref())?.to_string();

        debug!(state_dir = %ctx.state_dir.display(), resource = %resource, "resolved store");
        Ok(Self {
            ctx,
            config,
            resource,
        })
    }

    /// A file-backed engine for the resource, honoring `max_duration`.
    fn engine(&self) -> Result<Engine<FileStore, SystemClock>> {
        let store = FileStore::open(&self.ctx, &self.resource, self.config.lock_wait())?;
        let engine = Engine::new(store, SystemClock);

        Ok(match self.config.max_ttl()? {
            Some(max) => engine.with_max_duration(max),
            None => engine,
        })
    }

    /// Append an event about this resource to the audit log.
    ///
    /// Does nothing when `audit_log` is off; failures are only logged.
    fn record(&self, event: Event) {
        if !self.config.audit_log {
            return;
        }

        let event = event.with_resource(&self.resource);
        if let Err(e) = append_event(&self.ctx, &event) {
            warn!(action = %event.action, error = %e, "failed to append audit event");
        }
    }
}
