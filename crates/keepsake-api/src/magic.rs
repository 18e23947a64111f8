//! Magic-link protocol: bounded-use, time-boxed passwordless login.
//!
//! State per user: none → issued → consumed (up to max uses) →
//! exhausted or expired. Bounded reuse rather than strict single-use
//! accommodates a link opened from several devices within the window
//! while still capping exposure if it leaks.
//!
//! The decision core is pure and takes `now` explicitly; handlers pass
//! `Utc::now()` and apply the resulting state change to the store.

use chrono::{DateTime, TimeDelta, Utc};

use crate::token::opaque_token;

pub const DEFAULT_MAX_USES: i64 = 3;
pub const DEFAULT_EXPIRY_SECS: i64 = 15 * 60;

#[derive(Debug, Clone, Copy)]
pub struct MagicLinkConfig {
    pub max_uses: i64,
    pub expiry_secs: i64,
}

impl Default for MagicLinkConfig {
    fn default() -> Self {
        Self {
            max_uses: DEFAULT_MAX_USES,
            expiry_secs: DEFAULT_EXPIRY_SECS,
        }
    }
}

#[derive(Debug)]
pub struct IssuedLink {
    pub token: String,
    pub expires: DateTime<Utc>,
}

/// A fresh link always starts at zero uses; writing it over the previous
/// token is what invalidates any earlier link for the same user.
pub fn issue(config: MagicLinkConfig, now: DateTime<Utc>) -> IssuedLink {
    IssuedLink {
        token: opaque_token(),
        expires: now + TimeDelta::seconds(config.expiry_secs),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    /// Token missing or past its expiry.
    Rejected,
    /// Use count already at the cap before this attempt.
    Exhausted,
    /// Accepted; `retire` means this use reached the cap and the token
    /// must be cleared even though the time window has not closed.
    Accepted { uses: i64, retire: bool },
}

pub fn evaluate(
    expires: Option<DateTime<Utc>>,
    uses: i64,
    max_uses: i64,
    now: DateTime<Utc>,
) -> Consumption {
    let Some(expires) = expires else {
        return Consumption::Rejected;
    };
    if expires <= now {
        return Consumption::Rejected;
    }
    if uses >= max_uses {
        return Consumption::Exhausted;
    }
    let uses = uses + 1;
    Consumption::Accepted {
        uses,
        retire: uses >= max_uses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn issue_sets_window_and_fresh_token() {
        let config = MagicLinkConfig::default();
        let link = issue(config, at(0));
        assert_eq!(link.expires, at(DEFAULT_EXPIRY_SECS));
        assert_eq!(link.token.len(), 64);

        let again = issue(config, at(0));
        assert_ne!(link.token, again.token);
    }

    #[test]
    fn consumable_up_to_max_then_retired() {
        let max = 3;
        let expires = Some(at(900));

        assert_eq!(
            evaluate(expires, 0, max, at(0)),
            Consumption::Accepted { uses: 1, retire: false }
        );
        assert_eq!(
            evaluate(expires, 1, max, at(1)),
            Consumption::Accepted { uses: 2, retire: false }
        );
        // The max-th consumption succeeds but retires the token.
        assert_eq!(
            evaluate(expires, 2, max, at(2)),
            Consumption::Accepted { uses: 3, retire: true }
        );
        // At the cap the attempt is rejected before incrementing.
        assert_eq!(evaluate(expires, 3, max, at(3)), Consumption::Exhausted);
    }

    #[test]
    fn expired_or_missing_link_rejected() {
        assert_eq!(evaluate(None, 0, 3, at(0)), Consumption::Rejected);
        assert_eq!(evaluate(Some(at(100)), 0, 3, at(100)), Consumption::Rejected);
        assert_eq!(evaluate(Some(at(100)), 0, 3, at(101)), Consumption::Rejected);
    }

    #[test]
    fn expiry_wins_over_remaining_uses() {
        // Uses left, but the window has closed.
        assert_eq!(evaluate(Some(at(10)), 1, 3, at(20)), Consumption::Rejected);
    }

    #[test]
    fn single_use_config_retires_immediately() {
        assert_eq!(
            evaluate(Some(at(900)), 0, 1, at(0)),
            Consumption::Accepted { uses: 1, retire: true }
        );
        assert_eq!(evaluate(Some(at(900)), 1, 1, at(1)), Consumption::Exhausted);
    }
}
