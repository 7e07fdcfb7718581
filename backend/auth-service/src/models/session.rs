/// Session model
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub account_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub absolute_expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Session {
    /// A session is live when it has not been revoked, its absolute expiry
    /// lies ahead, and the idle window since the last touch has not elapsed.
    pub fn is_live_at(&self, now: DateTime<Utc>, idle_timeout: Duration) -> bool {
        self.revoked_at.is_none()
            && now < self.absolute_expires_at
            && now - self.last_activity_at < idle_timeout
    }

    /// Seconds until the absolute expiry, clamped at zero. Used for the
    /// cookie Max-Age.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.absolute_expires_at - now).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(last_activity_at: DateTime<Utc>, absolute_expires_at: DateTime<Utc>) -> Session {
        Session {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            created_at: Utc::now() - Duration::hours(1),
            last_activity_at,
            absolute_expires_at,
            revoked_at: None,
            ip_address: None,
            user_agent: None,
        }
    }

    #[test]
    fn live_within_both_windows() {
        let now = Utc::now();
        let s = session(now - Duration::minutes(29), now + Duration::hours(1));
        assert!(s.is_live_at(now, Duration::minutes(30)));
    }

    #[test]
    fn idle_timeout_kills_even_before_absolute_expiry() {
        let now = Utc::now();
        let s = session(now - Duration::minutes(31), now + Duration::hours(1));
        assert!(!s.is_live_at(now, Duration::minutes(30)));
    }

    #[test]
    fn absolute_expiry_kills_even_when_recently_active() {
        let now = Utc::now();
        let s = session(now - Duration::seconds(5), now - Duration::seconds(1));
        assert!(!s.is_live_at(now, Duration::minutes(30)));
    }

    #[test]
    fn revocation_wins_over_everything() {
        let now = Utc::now();
        let mut s = session(now, now + Duration::hours(1));
        s.revoked_at = Some(now);
        assert!(!s.is_live_at(now, Duration::minutes(30)));
    }

    #[test]
    fn remaining_secs_clamps_at_zero() {
        let now = Utc::now();
        let s = session(now, now - Duration::minutes(5));
        assert_eq!(s.remaining_secs(now), 0);
    }
}
