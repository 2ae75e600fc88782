//! CLI argument parsing for grantlock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the flag surface; actual implementations
//! are in the `commands` module.

use crate::grant::Mode;
use clap::{ArgAction, ArgGroup, Args, Parser};
use std::path::PathBuf;

/// Number of audit events shown by `--history` without an explicit count.
pub const DEFAULT_HISTORY_LIMIT: &str = "20";

/// grantlock: shared/exclusive grants on named resources, with expiry.
///
/// A resource is free, held shared by any number of holders, or held
/// exclusive by exactly one. Conflicting requests are refused immediately;
/// nothing ever waits for another holder.
#[derive(Parser, Debug)]
#[command(name = "grantlock")]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .multiple(false)
        .args(["status", "mode", "revoke", "init", "clear_lock", "history"])
))]
pub struct Cli {
    /// Print the live holders of the resource.
    #[arg(long)]
    pub status: bool,

    /// Request a grant in this mode (requires --duration).
    #[arg(long, value_enum, requires = "duration")]
    pub mode: Option<Mode>,

    /// How long the grant lasts, e.g. 45s, 30m, 1h30m, "2 days".
    #[arg(long, requires = "mode")]
    pub duration: Option<String>,

    /// Release a grant.
    #[arg(long)]
    pub revoke: bool,

    /// Holder identity for --mode and --revoke (defaults to the current OS user).
    #[arg(long, value_name = "NAME", conflicts_with_all = ["status", "init", "clear_lock", "history"])]
    pub user: Option<String>,

    /// Create the state directory and config template (idempotent).
    #[arg(long)]
    pub init: bool,

    /// Remove a store lock left behind by a crashed process (requires --force).
    #[arg(long)]
    pub clear_lock: bool,

    /// Confirm --clear-lock.
    #[arg(long, requires = "clear_lock")]
    pub force: bool,

    /// Show the last N audit events for the resource.
    #[arg(
        long,
        value_name = "N",
        num_args = 0..=1,
        default_missing_value = DEFAULT_HISTORY_LIMIT
    )]
    pub history: Option<usize>,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Increase diagnostic logging (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Options shared by every action.
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Store location (default: $GRANTLOCK_STATE_DIR, then ./.grantlock).
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Resource to operate on (default: `default_resource` from config.yaml).
    #[arg(long, value_name = "NAME")]
    pub resource: Option<String>,

    /// Print machine-readable JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// The single action selected on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Status,
    Grant { mode: Mode, duration: String },
    Revoke,
    Init,
    ClearLock { force: bool },
    History { limit: usize },
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The action chosen by the `action` group.
    ///
    /// Returns `None` only for a `Cli` built by hand without any action flag.
    pub fn action(&self) -> Option<Action> {
        if self.status {
            Some(Action::Status)
        } else if let (Some(mode), Some(duration)) = (self.mode, &self.duration) {
            Some(Action::Grant {
                mode,
                duration: duration.clone(),
            })
        } else if self.revoke {
            Some(Action::Revoke)
        } else if self.init {
            Some(Action::Init)
        } else if self.clear_lock {
            Some(Action::ClearLock { force: self.force })
        } else {
            self.history.map(|limit| Action::History { limit })
        }
    }
}
