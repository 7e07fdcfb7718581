//! Brute-force lockout guard
//!
//! Counts consecutive password failures per account and locks the account
//! for a cooldown once the threshold is crossed. Admission is checked
//! before any password hashing so a locked account costs no CPU and leaks
//! no timing. Locks reopen lazily: a lapsed `locked_until` simply stops
//! matching, no cleanup job runs.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config::LockoutSettings;
use crate::error::{AuthError, Result};
use crate::models::Account;
use crate::store::AccountStore;

pub struct LockoutGuard {
    max_attempts: i32,
    lock_duration: Duration,
}

impl LockoutGuard {
    pub fn new(max_attempts: i32, lock_duration: Duration) -> Self {
        Self {
            max_attempts,
            lock_duration,
        }
    }

    pub fn from_settings(settings: &LockoutSettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::seconds(settings.lockout_duration_secs),
        )
    }

    /// Admission check, consulted before any credential verification.
    pub fn admit(&self, account: &Account, now: DateTime<Utc>) -> Result<()> {
        match account.locked_until {
            Some(until) if until > now => Err(AuthError::AccountLocked { until }),
            _ => Ok(()),
        }
    }

    /// Record one failed attempt. The store applies the increment in a
    /// single statement; the candidate lock timestamp is computed here so
    /// the window arithmetic stays in one place. Returns the account as
    /// written, from which the caller can see whether this attempt crossed
    /// the threshold.
    pub async fn record_failure(
        &self,
        store: &dyn AccountStore,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Account> {
        store
            .record_login_failure(account_id, self.max_attempts, now + self.lock_duration)
            .await
    }

    /// A successful authentication wipes the slate.
    pub async fn record_success(
        &self,
        store: &dyn AccountStore,
        account_id: Uuid,
    ) -> Result<Account> {
        store.record_login_success(account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryAccountStore;

    fn guard() -> LockoutGuard {
        LockoutGuard::new(5, Duration::minutes(15))
    }

    async fn account(store: &MemoryAccountStore) -> Account {
        store
            .create_password_account("carol@example.com", "$argon2id$stub", None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn under_threshold_stays_open() {
        // GIVEN four failures
        let store = MemoryAccountStore::new();
        let account = account(&store).await;
        let guard = guard();
        let now = Utc::now();

        let mut latest = account.clone();
        for _ in 0..4 {
            latest = guard.record_failure(&store, account.id, now).await.unwrap();
        }

        // THEN admission is still granted
        assert_eq!(latest.failed_login_attempts, 4);
        assert!(guard.admit(&latest, now).is_ok());
    }

    #[tokio::test]
    async fn fifth_failure_locks_for_the_cooldown() {
        let store = MemoryAccountStore::new();
        let account = account(&store).await;
        let guard = guard();
        let now = Utc::now();

        let mut latest = account.clone();
        for _ in 0..5 {
            latest = guard.record_failure(&store, account.id, now).await.unwrap();
        }

        assert_eq!(latest.locked_until, Some(now + Duration::minutes(15)));
        assert!(matches!(
            guard.admit(&latest, now),
            Err(AuthError::AccountLocked { .. })
        ));
    }

    #[tokio::test]
    async fn lapsed_lock_admits_without_any_cleanup() {
        // GIVEN a lock that has run out
        let store = MemoryAccountStore::new();
        let account = account(&store).await;
        let guard = LockoutGuard::new(5, Duration::seconds(0));
        let now = Utc::now();

        let mut latest = account.clone();
        for _ in 0..5 {
            latest = guard.record_failure(&store, account.id, now).await.unwrap();
        }
        assert_eq!(latest.locked_until, Some(now));

        // WHEN admission is checked a moment later
        // THEN the lapsed lock no longer matches
        assert!(guard.admit(&latest, now + Duration::seconds(1)).is_ok());
    }

    #[tokio::test]
    async fn success_resets_the_counter() {
        let store = MemoryAccountStore::new();
        let account = account(&store).await;
        let guard = guard();
        let now = Utc::now();

        for _ in 0..3 {
            guard.record_failure(&store, account.id, now).await.unwrap();
        }
        let after = guard.record_success(&store, account.id).await.unwrap();

        assert_eq!(after.failed_login_attempts, 0);
        assert_eq!(after.locked_until, None);
    }
}
