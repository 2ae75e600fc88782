//! Error types for grantlock.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.

use crate::exit_codes;
use crate::grant::Mode;
use thiserror::Error;

/// Main error type for grantlock operations.
///
/// The set is closed: callers match it exhaustively, and every variant maps
/// to exactly one exit code.
#[derive(Error, Debug)]
pub enum GrantError {
    /// A holder that does not yet hold the resource asked for a mode that
    /// conflicts with the live holders.
    #[error(
        "grant refused: '{holder}' cannot take {requested} access while the resource is held {current} by {}",
        .held_by.join(", ")
    )]
    GrantFailure {
        holder: String,
        requested: Mode,
        current: Mode,
        held_by: Vec<String>,
    },

    /// An existing holder tried to switch mode while other holders are live.
    #[error(
        "upgrade refused: '{holder}' holds {current} access and cannot switch to {requested} while other holders are live ({})",
        .others.join(", ")
    )]
    UpgradeFailure {
        holder: String,
        requested: Mode,
        current: Mode,
        others: Vec<String>,
    },

    /// User provided invalid input or the store is in an unusable state.
    #[error("{0}")]
    UserError(String),

    /// Reading or writing persisted state failed.
    #[error("Store error: {0}")]
    StoreError(String),

    /// The store's exclusive section could not be entered.
    #[error("Lock acquisition failed: {0}")]
    LockError(String),
}

impl GrantError {
    /// Returns the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            GrantError::GrantFailure { .. } => exit_codes::GRANT_FAILURE,
            GrantError::UpgradeFailure { .. } => exit_codes::UPGRADE_FAILURE,
            GrantError::UserError(_) => exit_codes::USER_ERROR,
            GrantError::StoreError(_) => exit_codes::FAILURE,
            GrantError::LockError(_) => exit_codes::FAILURE,
        }
    }

    /// Whether this is one of the two engine-level refusals.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            GrantError::GrantFailure { .. } | GrantError::UpgradeFailure { .. }
        )
    }
}

/// Result type alias for grantlock operations.
pub type Result<T> = std::result::Result<T, GrantError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn grant_failure() -> GrantError {
        GrantError::GrantFailure {
            holder: "dave".to_string(),
            requested: Mode::Shared,
            current: Mode::Exclusive,
            held_by: vec!["carol".to_string()],
        }
    }

    fn upgrade_failure() -> GrantError {
        GrantError::UpgradeFailure {
            holder: "bob".to_string(),
            requested: Mode::Exclusive,
            current: Mode::Shared,
            others: vec!["alice".to_string()],
        }
    }

    #[test]
    fn grant_failure_has_correct_exit_code() {
        assert_eq!(grant_failure().exit_code(), exit_codes::GRANT_FAILURE);
    }

    #[test]
    fn upgrade_failure_has_correct_exit_code() {
        assert_eq!(upgrade_failure().exit_code(), exit_codes::UPGRADE_FAILURE);
    }

    #[test]
    fn user_error_has_correct_exit_code() {
        let err = GrantError::UserError("bad duration".to_string());
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn store_and_lock_errors_are_generic_failures() {
        let err = GrantError::StoreError("disk full".to_string());
        assert_eq!(err.exit_code(), exit_codes::FAILURE);

        let err = GrantError::LockError("timed out".to_string());
        assert_eq!(err.exit_code(), exit_codes::FAILURE);
    }

    #[test]
    fn only_engine_refusals_are_conflicts() {
        assert!(grant_failure().is_conflict());
        assert!(upgrade_failure().is_conflict());
        assert!(!GrantError::StoreError("x".to_string()).is_conflict());
        assert!(!GrantError::UserError("x".to_string()).is_conflict());
    }

    #[test]
    fn error_messages_are_descriptive() {
        assert_eq!(
            grant_failure().to_string(),
            "grant refused: 'dave' cannot take shared access while the resource is held exclusive by carol"
        );
        assert_eq!(
            upgrade_failure().to_string(),
            "upgrade refused: 'bob' holds shared access and cannot switch to exclusive while other holders are live (alice)"
        );

        let err = GrantError::StoreError("record is corrupt".to_string());
        assert_eq!(err.to_string(), "Store error: record is corrupt");
    }
}
