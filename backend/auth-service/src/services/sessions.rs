// ===== Session Manager =====
//
// Server-side session lifecycle. A session is live while all three hold:
// it has not been revoked, its absolute expiry is in the future, and the
// idle window since the last touch has not lapsed. Reads go through
// `touch`, which slides both the activity timestamp and the absolute
// expiry in the same conditional update that re-checks liveness, so a
// revocation that lands first always wins.

use std::sync::Arc;

use axum::http::header::COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config::SessionSettings;
use crate::error::{AuthError, Result};
use crate::models::Session;
use crate::store::SessionStore;

pub const SESSION_COOKIE_NAME: &str = "session_id";

/// Outcome of comparing a session's recorded origin against the request
/// that is presenting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingCheck {
    Valid,
    Mismatch(&'static str),
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    absolute_ttl: Duration,
    idle_timeout: Duration,
    cookie_secure: bool,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, settings: &SessionSettings) -> Self {
        Self {
            store,
            absolute_ttl: Duration::seconds(settings.absolute_ttl_secs),
            idle_timeout: Duration::seconds(settings.idle_timeout_secs),
            cookie_secure: settings.cookie_secure,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Open a fresh session for an account that just authenticated.
    pub async fn create(
        &self,
        account_id: Uuid,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            account_id,
            created_at: now,
            last_activity_at: now,
            absolute_expires_at: now + self.absolute_ttl,
            revoked_at: None,
            ip_address,
            user_agent,
        };
        self.store.insert(session).await
    }

    /// Slide the activity window and the absolute expiry if the session is
    /// still live. Returns `None` for sessions that are revoked, absolutely
    /// expired, or idle past the timeout; the dead row is dropped by the
    /// store on that path.
    pub async fn touch(&self, session_id: Uuid) -> Result<Option<Session>> {
        let now = Utc::now();
        let idle_cutoff = now - self.idle_timeout;
        self.store
            .touch(session_id, now, idle_cutoff, now + self.absolute_ttl)
            .await
    }

    /// Compare the IP and user agent a session was opened with against the
    /// values observed on the current request. Advisory: a mismatch is
    /// logged and reported to the caller, never rejected here. Values that
    /// were not recorded at creation, or not observed now, do not count
    /// against the session.
    pub fn validate_binding(
        &self,
        session: &Session,
        observed_ip: Option<&str>,
        observed_user_agent: Option<&str>,
    ) -> BindingCheck {
        let differs = |recorded: Option<&str>, observed: Option<&str>| {
            matches!((recorded, observed), (Some(a), Some(b)) if a != b)
        };

        let reason = if differs(session.ip_address.as_deref(), observed_ip) {
            Some("ip address changed")
        } else if differs(session.user_agent.as_deref(), observed_user_agent) {
            Some("user agent changed")
        } else {
            None
        };

        match reason {
            Some(reason) => {
                tracing::warn!(
                    session_id = %session.id,
                    account_id = %session.account_id,
                    reason,
                    "session binding mismatch"
                );
                BindingCheck::Mismatch(reason)
            }
            None => BindingCheck::Valid,
        }
    }

    /// Revoke a single session. Idempotent: revoking an already revoked or
    /// unknown session reports `false` without error.
    pub async fn revoke(&self, session_id: Uuid) -> Result<bool> {
        self.store.revoke(session_id).await
    }

    /// Revoke every live session the account holds. Returns how many were
    /// actually revoked.
    pub async fn revoke_all(&self, account_id: Uuid) -> Result<u64> {
        self.store.revoke_all_for_account(account_id).await
    }

    /// Build the `Set-Cookie` value that binds this session to the browser.
    /// Max-Age tracks the remaining absolute lifetime so the cookie and the
    /// server row expire together.
    pub fn session_cookie(&self, session: &Session, now: DateTime<Utc>) -> Result<HeaderValue> {
        let max_age = session.remaining_secs(now);
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}",
            session.id
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).map_err(|e| AuthError::Internal(e.to_string()))
    }

    /// Build the clearing `Set-Cookie` value sent on logout.
    pub fn cleared_session_cookie(&self) -> Result<HeaderValue> {
        let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).map_err(|e| AuthError::Internal(e.to_string()))
    }
}

/// Pull the session id out of the request's `Cookie` header, if present.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let key = parts.next()?.trim();
        // Flag-style pairs without a value are skipped, not fatal
        let Some(val) = parts.next() else { continue };
        if key == SESSION_COOKIE_NAME {
            return Uuid::parse_str(val.trim()).ok();
        }
    }
    None
}
