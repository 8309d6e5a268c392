//! Optimistic-concurrency freshness guard
//!
//! Updates carry the `last_modified` stamp of the version the client last
//! read. No lock is held between read and write; a write based on a stale
//! read is rejected and the client must reload and resubmit.

use crate::types::Timestamp;

/// Client token is older than the stored version, or missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("conflict: stored version {stored} is newer than client token {client:?}")]
pub struct Conflict {
    /// Stored modification stamp
    pub stored: Timestamp,
    /// Token supplied by the client
    pub client: Option<Timestamp>,
}

/// Check a client freshness token against the stored stamp
///
/// A missing token means unknown freshness and is a conflict.
///
/// # Errors
/// [`Conflict`] iff `client` is absent or `stored > client`.
pub fn check_freshness(stored: Timestamp, client: Option<Timestamp>) -> Result<(), Conflict> {
    match client {
        Some(seen) if stored <= seen => Ok(()),
        _ => Err(Conflict { stored, client }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn at(millis: i64) -> Timestamp {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn equal_stamp_is_fresh() {
        let stamp = at(1_700_000_000_000);
        assert!(check_freshness(stamp, Some(stamp)).is_ok());
    }

    #[test]
    fn newer_client_token_is_fresh() {
        let stored = at(1_700_000_000_000);
        assert!(check_freshness(stored, Some(stored + Duration::seconds(5))).is_ok());
    }

    #[test]
    fn older_client_token_conflicts() {
        let stored = at(1_700_000_000_000);
        let client = stored - Duration::milliseconds(1);
        assert_eq!(
            check_freshness(stored, Some(client)),
            Err(Conflict {
                stored,
                client: Some(client)
            })
        );
    }

    #[test]
    fn missing_token_conflicts() {
        let stored = at(0);
        assert!(check_freshness(stored, None).is_err());
    }

    proptest! {
        #[test]
        fn conflict_iff_stored_newer_or_absent(
            stored in 0i64..4_000_000_000_000,
            client in proptest::option::of(0i64..4_000_000_000_000),
        ) {
            let result = check_freshness(at(stored), client.map(at));
            let expected_conflict = client.map_or(true, |c| stored > c);
            prop_assert_eq!(result.is_err(), expected_conflict);
        }
    }
}
