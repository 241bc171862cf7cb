//! Magic-link token evaluation.
//!
//! Opaque secrets live in the user directory. A non-permanent secret is
//! valid for five minutes and deleted on first use; a permanent secret is
//! reusable (game-client device links).

use chrono::{DateTime, Duration, Utc};

use crate::directory::LoginToken;

pub const LINK_TTL_MINUTES: i64 = 5;

/// What presenting a magic-link secret should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDisposition {
    /// Authenticate and delete the record.
    ConsumeAndAccept,
    /// Authenticate and keep the record.
    Accept,
    /// Past the validity window; delete the record and refuse.
    Expired,
}

#[must_use]
pub fn evaluate(token: &LoginToken, now: DateTime<Utc>) -> LinkDisposition {
    if token.permanent {
        return LinkDisposition::Accept;
    }
    if token.created_at + Duration::minutes(LINK_TTL_MINUTES) < now {
        return LinkDisposition::Expired;
    }
    LinkDisposition::ConsumeAndAccept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(permanent: bool, age_seconds: i64, now: DateTime<Utc>) -> LoginToken {
        LoginToken {
            id: 1,
            user_id: 123,
            secret: "abc123".to_string(),
            permanent,
            created_at: now - Duration::seconds(age_seconds),
        }
    }

    #[test]
    fn fresh_single_use_link_is_consumed() {
        let now = Utc::now();
        assert_eq!(
            evaluate(&token(false, 60, now), now),
            LinkDisposition::ConsumeAndAccept
        );
    }

    #[test]
    fn stale_single_use_link_is_expired() {
        let now = Utc::now();
        assert_eq!(
            evaluate(&token(false, 6 * 60, now), now),
            LinkDisposition::Expired
        );
    }

    #[test]
    fn boundary_is_inclusive_of_the_window() {
        let now = Utc::now();
        // Exactly five minutes old is still inside the window.
        assert_eq!(
            evaluate(&token(false, 5 * 60, now), now),
            LinkDisposition::ConsumeAndAccept
        );
    }

    #[test]
    fn permanent_links_never_expire() {
        let now = Utc::now();
        assert_eq!(
            evaluate(&token(true, 365 * 24 * 3600, now), now),
            LinkDisposition::Accept
        );
    }
}
