//! Outbound security notifications.
//!
//! The auth flows only decide *that* a notification is due; rendering and
//! delivery belong to the mail pipeline behind this seam. The default
//! implementation logs, which is also what keeps the password-reset flow
//! honest: the HTTP response never depends on delivery succeeding.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait SecurityNotifier: Send + Sync {
    /// A password reset was requested for an existing account. The token is
    /// the raw single-use secret the account holder must present back.
    async fn password_reset_requested(
        &self,
        email: &str,
        reset_token: &str,
        expires_at: DateTime<Utc>,
    );

    /// The account crossed the failed-attempt threshold and is now locked.
    async fn account_locked(&self, email: &str, locked_until: DateTime<Utc>);
}

/// Log-only notifier used until a real mail transport is wired in.
pub struct LogNotifier;

#[async_trait]
impl SecurityNotifier for LogNotifier {
    async fn password_reset_requested(
        &self,
        email: &str,
        _reset_token: &str,
        expires_at: DateTime<Utc>,
    ) {
        tracing::info!(%email, %expires_at, "password reset token issued");
    }

    async fn account_locked(&self, email: &str, locked_until: DateTime<Utc>) {
        tracing::warn!(%email, %locked_until, "account locked after repeated failures");
    }
}
