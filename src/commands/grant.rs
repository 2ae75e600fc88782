//! Implementation of grant requests (`--mode`) and `--revoke`.

use super::Target;
use crate::cli::StoreArgs;
use crate::clock::remaining_string;
use crate::error::{GrantError, Result};
use crate::events::{Event, EventAction};
use crate::grant::{Grant, GrantKind, Mode, Revoke};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

#[derive(Serialize)]
struct GrantOutput<'a> {
    resource: &'a str,
    #[serde(flatten)]
    grant: &'a Grant,
}

#[derive(Serialize)]
struct RevokeOutput<'a> {
    resource: &'a str,
    #[serde(flatten)]
    revoke: &'a Revoke,
}

/// Execute `grantlock --mode MODE --duration DURATION`.
///
/// Refusals are logged as `grant_denied` and returned unchanged so `main`
/// maps them to their exit codes.
pub fn cmd_grant(args: &StoreArgs, holder: &str, mode: Mode, duration: &str) -> Result<()> {
    let target = Target::open(args)?;
    let engine = target.engine()?;

    let grant = match engine.grant(holder, mode, duration) {
        Ok(grant) => grant,
        Err(e) => {
            if e.is_conflict() {
                target.record(denied_event(holder, mode, duration, &e));
            }
            return Err(e);
        }
    };

    log_expired(&target, &grant.expired);
    target.record(
        Event::new(EventAction::Grant)
            .with_holder(holder)
            .with_details(json!({
                "mode": grant.mode,
                "duration": duration,
                "expires_at": grant.expires_at,
                "outcome": grant.kind,
            })),
    );

    if args.json {
        print_json(&GrantOutput {
            resource: &target.resource,
            grant: &grant,
        })?;
    } else {
        println!("{}", describe_grant(&target.resource, &grant));
    }

    Ok(())
}

/// Execute `grantlock --revoke`.
pub fn cmd_revoke(args: &StoreArgs, holder: &str) -> Result<()> {
    let target = Target::open(args)?;
    let revoke = target.engine()?.revoke(holder)?;

    log_expired(&target, &revoke.expired);
    if revoke.released {
        target.record(
            Event::new(EventAction::Revoke)
                .with_holder(holder)
                .with_details(json!({ "remaining": revoke.remaining })),
        );
    }

    if args.json {
        print_json(&RevokeOutput {
            resource: &target.resource,
            revoke: &revoke,
        })?;
    } else {
        println!("{}", describe_revoke(&target.resource, &revoke));
    }

    Ok(())
}

fn denied_event(holder: &str, mode: Mode, duration: &str, err: &GrantError) -> Event {
    let (reason, current, blocking) = match err {
        GrantError::GrantFailure {
            current, held_by, ..
        } => ("grant_failure", Some(*current), held_by.clone()),
        GrantError::UpgradeFailure {
            current, others, ..
        } => ("upgrade_failure", Some(*current), others.clone()),
        _ => ("error", None, Vec::new()),
    };

    Event::new(EventAction::GrantDenied)
        .with_holder(holder)
        .with_details(json!({
            "reason": reason,
            "requested": mode,
            "duration": duration,
            "current": current,
            "blocking": blocking,
        }))
}

pub(super) fn log_expired(target: &Target, expired: &[String]) {
    if expired.is_empty() {
        return;
    }

    target.record(Event::new(EventAction::Expire).with_details(json!({ "holders": expired })));
}

fn describe_grant(resource: &str, grant: &Grant) -> String {
    let until = format!(
        "until {} (in {})",
        grant.expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
        remaining_string(Utc::now(), grant.expires_at)
    );

    match grant.kind {
        GrantKind::Acquired => format!(
            "Granted {} access on '{}' to {} {}",
            grant.mode, resource, grant.holder, until
        ),
        GrantKind::Joined => format!(
            "{} joined shared access on '{}' {}",
            grant.holder, resource, until
        ),
        GrantKind::Renewed => format!(
            "Renewed {}'s {} access on '{}' {}",
            grant.holder, grant.mode, resource, until
        ),
        GrantKind::Converted { from } => format!(
            "Converted {}'s access on '{}' from {} to {} {}",
            grant.holder, resource, from, grant.mode, until
        ),
    }
}

fn describe_revoke(resource: &str, revoke: &Revoke) -> String {
    if !revoke.released {
        return format!(
            "{} holds no grant on '{}'; nothing to revoke.",
            revoke.holder, resource
        );
    }

    match revoke.remaining {
        0 => format!("Revoked {}'s grant; '{}' is now free.", revoke.holder, resource),
        n => format!(
            "Revoked {}'s grant on '{}' ({} holder(s) remain).",
            revoke.holder, resource, n
        ),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| GrantError::StoreError(format!("failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::read_events;
    use crate::exit_codes;
    use crate::grant::{Engine, Status};
    use crate::test_support::{create_test_store, store_args};
    use chrono::Duration;

    fn status(args: &StoreArgs) -> Option<Status> {
        Target::open(args).unwrap().engine().unwrap().status().unwrap()
    }

    fn actions(ctx: &crate::context::StoreContext) -> Vec<EventAction> {
        read_events(ctx).unwrap().iter().map(|e| e.action).collect()
    }

    #[test]
    fn test_grant_and_revoke_through_files() {
        let (_temp_dir, ctx) = create_test_store();
        let args = store_args(&ctx, "db");

        cmd_grant(&args, "alice", Mode::Shared, "10m").unwrap();
        cmd_grant(&args, "bob", Mode::Shared, "10m").unwrap();

        let held = status(&args).unwrap();
        assert_eq!(held.mode, Mode::Shared);
        assert_eq!(held.holder_names(), vec!["alice", "bob"]);

        cmd_revoke(&args, "alice").unwrap();
        cmd_revoke(&args, "bob").unwrap();
        assert!(status(&args).is_none());
        assert!(!ctx.record_path("db").exists());

        assert_eq!(
            actions(&ctx),
            vec![
                EventAction::Grant,
                EventAction::Grant,
                EventAction::Revoke,
                EventAction::Revoke
            ]
        );
    }

    #[test]
    fn test_refused_grant_keeps_exit_code_and_logs_denial() {
        let (_temp_dir, ctx) = create_test_store();
        let args = store_args(&ctx, "db");

        cmd_grant(&args, "carol", Mode::Exclusive, "10m").unwrap();
        let err = cmd_grant(&args, "dave", Mode::Shared, "10m").unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::GRANT_FAILURE);

        let events = read_events(&ctx).unwrap();
        let denied = events.last().unwrap();
        assert_eq!(denied.action, EventAction::GrantDenied);
        assert_eq!(denied.holder.as_deref(), Some("dave"));
        assert_eq!(denied.details["reason"], "grant_failure");
        assert_eq!(denied.details["blocking"], json!(["carol"]));

        // The refused request changed nothing.
        assert_eq!(status(&args).unwrap().holder_names(), vec!["carol"]);
    }

    #[test]
    fn test_refused_upgrade_exit_code() {
        let (_temp_dir, ctx) = create_test_store();
        let args = store_args(&ctx, "db");

        cmd_grant(&args, "alice", Mode::Shared, "10m").unwrap();
        cmd_grant(&args, "bob", Mode::Shared, "10m").unwrap();

        let err = cmd_grant(&args, "bob", Mode::Exclusive, "10m").unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::UPGRADE_FAILURE);
        assert_eq!(
            read_events(&ctx).unwrap().last().unwrap().details["reason"],
            "upgrade_failure"
        );
    }

    #[test]
    fn test_bad_duration_is_user_error_and_not_logged() {
        let (_temp_dir, ctx) = create_test_store();
        let args = store_args(&ctx, "db");

        let err = cmd_grant(&args, "alice", Mode::Shared, "forever").unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
        assert!(read_events(&ctx).unwrap().is_empty());
        assert!(!ctx.record_path("db").exists());
    }

    #[test]
    fn test_revoke_of_non_holder_is_quiet_success() {
        let (_temp_dir, ctx) = create_test_store();
        let args = store_args(&ctx, "db");

        cmd_revoke(&args, "nobody").unwrap();
        assert!(read_events(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_expired_holders_are_logged() {
        let (_temp_dir, ctx) = create_test_store();
        let args = store_args(&ctx, "db");

        // Plant a grant that has already run out.
        let stale = Engine::new(
            crate::store::FileStore::open(&ctx, "db", Default::default()).unwrap(),
            crate::clock::ManualClock::new(Utc::now() - Duration::hours(1)),
        );
        stale.grant("carol", Mode::Exclusive, "1m").unwrap();

        cmd_grant(&args, "dave", Mode::Exclusive, "10m").unwrap();

        let events = read_events(&ctx).unwrap();
        assert_eq!(actions(&ctx), vec![EventAction::Expire, EventAction::Grant]);
        assert_eq!(events[0].details["holders"], json!(["carol"]));
        assert_eq!(status(&args).unwrap().holder_names(), vec!["dave"]);
    }

    #[test]
    fn test_grant_json_output_shape() {
        let grant = Grant {
            holder: "alice".to_string(),
            mode: Mode::Exclusive,
            expires_at: Utc::now(),
            kind: GrantKind::Converted { from: Mode::Shared },
            expired: vec![],
        };
        let value = serde_json::to_value(GrantOutput {
            resource: "db",
            grant: &grant,
        })
        .unwrap();

        assert_eq!(value["resource"], "db");
        assert_eq!(value["holder"], "alice");
        assert_eq!(value["mode"], "exclusive");
        assert_eq!(value["kind"], "converted");
        assert_eq!(value["from"], "shared");
    }

    #[test]
    fn test_describe_revoke() {
        let mut revoke = Revoke {
            holder: "alice".to_string(),
            released: true,
            remaining: 0,
            expired: vec![],
        };
        assert!(describe_revoke("db", &revoke).contains("now free"));

        revoke.remaining = 2;
        assert!(describe_revoke("db", &revoke).contains("2 holder(s) remain"));

        revoke.released = false;
        assert!(describe_revoke("db", &revoke).contains("nothing to revoke"));
    }
}
