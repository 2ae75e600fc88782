//! Filesystem utilities for grantlock.
//!
//! Records must never be observed half-written, so every record write goes
//! through [`atomic_write`].

pub mod atomic;

pub use atomic::{atomic_write, remove_if_exists};
