//! Exit code constants for the grantlock CLI.
//!
//! Scripts branch on these, so they are stable:
//! - 0: Success
//! - 1: Unexpected failure (store I/O, corrupt record, lock timeout)
//! - 2: User error (bad args, bad duration, uninitialized store)
//! - 3: Grant refused because of a conflicting live holder
//! - 4: Upgrade/downgrade refused because other holders are live

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// Unexpected failure: store I/O, corrupt records, or the store lock could not be taken.
pub const FAILURE: i32 = 1;

/// User error: bad arguments, unparsable duration, or uninitialized store.
///
/// Matches the code clap uses for usage errors.
pub const USER_ERROR: i32 = 2;

/// A new holder's request conflicts with the mode of the live holders.
pub const GRANT_FAILURE: i32 = 3;

/// An existing holder tried to change its mode while others are live.
pub const UPGRADE_FAILURE: i32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [SUCCESS, FAILURE, USER_ERROR, GRANT_FAILURE, UPGRADE_FAILURE];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(SUCCESS, 0);
        assert_eq!(FAILURE, 1);
        assert_eq!(USER_ERROR, 2);
        assert_eq!(GRANT_FAILURE, 3);
        assert_eq!(UPGRADE_FAILURE, 4);
    }
}
