//! Grant engine for one resource.
//!
//! A resource is either free (no record) or held, in shared mode by one or
//! more holders or in exclusive mode by exactly one. Every holder carries its
//! own expiry; expired holders stop counting the next time any operation
//! looks at the record.
//!
//! # Operations
//!
//! - [`Engine::grant`] adds, renews, or converts a holder's grant
//! - [`Engine::revoke`] removes a holder (idempotent)
//! - [`Engine::status`] returns the live view, or `None` when free
//!
//! None of them wait for another holder. Conflicts come back immediately as
//! [`GrantError::GrantFailure`](crate::error::GrantError::GrantFailure) or
//! [`GrantError::UpgradeFailure`](crate::error::GrantError::UpgradeFailure);
//! retrying is the caller's business.

mod decision;
mod engine;
mod model;


pub use decision::GrantKind;
pub use engine::{Engine, Grant, Revoke};
pub use model::{GrantRecord, Mode, Status};
