//! Persistence seams
//!
//! Accounts and sessions live in Postgres, rate windows and OAuth state in
//! Redis. Every seam is a trait so the service layer can run against the
//! in-memory implementations in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Account, OAuthLink, ProviderTokens, Session, StateRecord};

pub mod memory;
pub mod postgres;
pub mod redis;

pub use memory::{MemoryAccountStore, MemoryRateWindows, MemorySessionStore, MemoryStateStore};
pub use postgres::{PgAccountStore, PgSessionStore};
pub use self::redis::{RedisRateWindows, RedisStateStore};

/// Account rows plus the write paths the login pipeline needs.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create_password_account(
        &self,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> Result<Account>;

    /// Accounts arriving through a federated provider have no password hash.
    async fn create_federated_account(
        &self,
        email: &str,
        name: Option<&str>,
        email_verified: bool,
    ) -> Result<Account>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>>;

    /// Bump the failure counter in a single statement; crossing
    /// `max_attempts` stamps `locked_until`. Concurrent failures may not
    /// observe each other's increment before writing their own, which is
    /// why the increment happens store-side. Returns the row as written.
    async fn record_login_failure(
        &self,
        id: Uuid,
        max_attempts: i32,
        locked_until: DateTime<Utc>,
    ) -> Result<Account>;

    /// Zero the failure counter, clear any lock, stamp `last_login_at`.
    async fn record_login_success(&self, id: Uuid) -> Result<Account>;

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()>;

    /// Zero the failure counter and clear any lock without touching
    /// `last_login_at`. Used when a password reset completes.
    async fn clear_lockout(&self, id: Uuid) -> Result<()>;

    async fn find_link(&self, provider: &str, provider_subject: &str)
        -> Result<Option<OAuthLink>>;

    async fn create_link(
        &self,
        account_id: Uuid,
        provider: &str,
        provider_subject: &str,
        email: Option<&str>,
        name: Option<&str>,
        tokens: &ProviderTokens,
    ) -> Result<OAuthLink>;

    /// Rewrite the link's provider token columns after a fresh grant. The
    /// identity columns never change after creation.
    async fn refresh_link_tokens(&self, link_id: Uuid, tokens: &ProviderTokens) -> Result<()>;

    /// Stores a new reset token hash and invalidates any outstanding ones
    /// for the same account.
    async fn create_reset_token(
        &self,
        account_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Single-use consume: marks the token used and returns the owning
    /// account only when it was unused and unexpired.
    async fn consume_reset_token(&self, token_hash: &str) -> Result<Option<Uuid>>;
}

/// Server-side session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: Session) -> Result<Session>;

    async fn find(&self, id: Uuid) -> Result<Option<Session>>;

    /// Conditional sliding touch: stamps `last_activity_at = now` and moves
    /// `absolute_expires_at` forward to `absolute_expiry`, only while the
    /// session is live. A dead row is deleted here (lazy cleanup) and `None`
    /// comes back. `idle_cutoff` is `now - idle_timeout`.
    async fn touch(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        idle_cutoff: DateTime<Utc>,
        absolute_expiry: DateTime<Utc>,
    ) -> Result<Option<Session>>;

    /// Mark one session revoked. Revocation wins races against concurrent
    /// touches because both sides gate on `revoked_at IS NULL`. Revoking an
    /// unknown or already-dead session is a no-op; returns whether a live
    /// session was actually revoked.
    async fn revoke(&self, id: Uuid) -> Result<bool>;

    async fn revoke_all_for_account(&self, account_id: Uuid) -> Result<u64>;
}

/// Fixed-window counters for the rate limiter.
#[async_trait]
pub trait RateWindowStore: Send + Sync {
    /// Register one hit against `key`. Returns the hit count inside the
    /// current window and the seconds until the window resets.
    async fn hit(&self, key: &str, window_secs: u64) -> Result<(u64, u64)>;
}

/// Single-use storage for OAuth state nonces.
#[async_trait]
pub trait OAuthStateStore: Send + Sync {
    async fn put(&self, state: &str, record: &StateRecord, ttl_secs: u64) -> Result<()>;

    /// Fetch-and-delete in one step so a state value can never be presented
    /// twice.
    async fn take(&self, state: &str) -> Result<Option<StateRecord>>;
}
