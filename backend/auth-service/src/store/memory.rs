//! In-memory store implementations
//!
//! Back the service layer in tests and single-node setups. Semantics mirror
//! the Postgres and Redis implementations, including lazy cleanup of
//! expired rows.

use std::collections::HashMap;
use std::time::{Duration as StdDuration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::models::{Account, OAuthLink, PasswordResetToken, ProviderTokens, Session, StateRecord};

use super::{AccountStore, OAuthStateStore, RateWindowStore, SessionStore};

#[derive(Default)]
pub struct MemoryAccountStore {
    inner: Mutex<AccountsInner>,
}

#[derive(Default)]
struct AccountsInner {
    accounts: HashMap<Uuid, Account>,
    links: Vec<OAuthLink>,
    reset_tokens: Vec<PasswordResetToken>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle the active flag directly; account administration has no API
    /// surface here, the flag is flipped out of band.
    pub async fn set_active(&self, id: Uuid, active: bool) {
        let mut inner = self.inner.lock().await;
        if let Some(account) = inner.accounts.get_mut(&id) {
            account.is_active = active;
            account.updated_at = Utc::now();
        }
    }

    /// Mark the address verified, as the verification pipeline would.
    pub async fn set_email_verified(&self, id: Uuid, verified: bool) {
        let mut inner = self.inner.lock().await;
        if let Some(account) = inner.accounts.get_mut(&id) {
            account.email_verified = verified;
            account.updated_at = Utc::now();
        }
    }
}

fn new_account(
    email: &str,
    password_hash: Option<&str>,
    name: Option<&str>,
    email_verified: bool,
) -> Account {
    let now = Utc::now();
    Account {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: password_hash.map(str::to_string),
        name: name.map(str::to_string),
        role: "member".to_string(),
        is_active: true,
        email_verified,
        failed_login_attempts: 0,
        locked_until: None,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create_password_account(
        &self,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> Result<Account> {
        let mut inner = self.inner.lock().await;
        if inner.accounts.values().any(|a| a.email == email) {
            return Err(AuthError::EmailAlreadyExists);
        }
        let account = new_account(email, Some(password_hash), name, false);
        inner.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn create_federated_account(
        &self,
        email: &str,
        name: Option<&str>,
        email_verified: bool,
    ) -> Result<Account> {
        let mut inner = self.inner.lock().await;
        if inner.accounts.values().any(|a| a.email == email) {
            return Err(AuthError::EmailAlreadyExists);
        }
        let account = new_account(email, None, name, email_verified);
        inner.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let inner = self.inner.lock().await;
        Ok(inner.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let inner = self.inner.lock().await;
        Ok(inner.accounts.get(&id).cloned())
    }

    async fn record_login_failure(
        &self,
        id: Uuid,
        max_attempts: i32,
        locked_until: DateTime<Utc>,
    ) -> Result<Account> {
        let mut inner = self.inner.lock().await;
        let account = inner
            .accounts
            .get_mut(&id)
            .ok_or_else(|| AuthError::Database("account not found".to_string()))?;

        account.failed_login_attempts += 1;
        if account.failed_login_attempts >= max_attempts {
            account.locked_until = Some(locked_until);
        }
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn record_login_success(&self, id: Uuid) -> Result<Account> {
        let mut inner = self.inner.lock().await;
        let account = inner
            .accounts
            .get_mut(&id)
            .ok_or_else(|| AuthError::Database("account not found".to_string()))?;

        account.failed_login_attempts = 0;
        account.locked_until = None;
        account.last_login_at = Some(Utc::now());
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let account = inner
            .accounts
            .get_mut(&id)
            .ok_or_else(|| AuthError::Database("account not found".to_string()))?;

        account.password_hash = Some(password_hash.to_string());
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn clear_lockout(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let account = inner
            .accounts
            .get_mut(&id)
            .ok_or_else(|| AuthError::Database("account not found".to_string()))?;

        account.failed_login_attempts = 0;
        account.locked_until = None;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn find_link(
        &self,
        provider: &str,
        provider_subject: &str,
    ) -> Result<Option<OAuthLink>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .links
            .iter()
            .find(|l| l.provider == provider && l.provider_subject == provider_subject)
            .cloned())
    }

    async fn create_link(
        &self,
        account_id: Uuid,
        provider: &str,
        provider_subject: &str,
        email: Option<&str>,
        name: Option<&str>,
        tokens: &ProviderTokens,
    ) -> Result<OAuthLink> {
        let mut inner = self.inner.lock().await;
        if inner.links.iter().any(|l| {
            (l.provider == provider && l.provider_subject == provider_subject)
                || (l.account_id == account_id && l.provider == provider)
        }) {
            return Err(AuthError::OAuthLinkConflict(provider.to_string()));
        }
        let now = Utc::now();
        let link = OAuthLink {
            id: Uuid::new_v4(),
            account_id,
            provider: provider.to_string(),
            provider_subject: provider_subject.to_string(),
            email: email.map(str::to_string),
            name: name.map(str::to_string),
            provider_access_token: tokens.access_token.clone(),
            provider_refresh_token: tokens.refresh_token.clone(),
            provider_token_expires_at: tokens.expires_at,
            created_at: now,
            updated_at: now,
        };
        inner.links.push(link.clone());
        Ok(link)
    }

    async fn refresh_link_tokens(&self, link_id: Uuid, tokens: &ProviderTokens) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(link) = inner.links.iter_mut().find(|l| l.id == link_id) {
            link.provider_access_token = tokens.access_token.clone();
            link.provider_refresh_token = tokens.refresh_token.clone();
            link.provider_token_expires_at = tokens.expires_at;
            link.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn create_reset_token(
        &self,
        account_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        for token in inner
            .reset_tokens
            .iter_mut()
            .filter(|t| t.account_id == account_id && t.used_at.is_none())
        {
            token.used_at = Some(now);
        }
        inner.reset_tokens.push(PasswordResetToken {
            id: Uuid::new_v4(),
            account_id,
            token_hash: token_hash.to_string(),
            expires_at,
            used_at: None,
            created_at: now,
        });
        Ok(())
    }

    async fn consume_reset_token(&self, token_hash: &str) -> Result<Option<Uuid>> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let Some(token) = inner
            .reset_tokens
            .iter_mut()
            .find(|t| t.token_hash == token_hash && t.used_at.is_none() && t.expires_at > now)
        else {
            return Ok(None);
        };
        token.used_at = Some(now);
        Ok(Some(token.account_id))
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: Session) -> Result<Session> {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Session>> {
        let sessions = self.sessions.lock().await;
        Ok(sessions.get(&id).cloned())
    }

    async fn touch(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        idle_cutoff: DateTime<Utc>,
        absolute_expiry: DateTime<Utc>,
    ) -> Result<Option<Session>> {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(&id) else {
            return Ok(None);
        };

        let live = session.revoked_at.is_none()
            && session.absolute_expires_at > now
            && session.last_activity_at > idle_cutoff;

        if live {
            session.last_activity_at = now;
            session.absolute_expires_at = absolute_expiry;
            Ok(Some(session.clone()))
        } else {
            // Lazy cleanup of the corpse
            sessions.remove(&id);
            Ok(None)
        }
    }

    async fn revoke(&self, id: Uuid) -> Result<bool> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&id) {
            Some(session) if session.revoked_at.is_none() => {
                session.revoked_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_account(&self, account_id: Uuid) -> Result<u64> {
        let mut sessions = self.sessions.lock().await;
        let now = Utc::now();
        let mut revoked = 0;
        for session in sessions
            .values_mut()
            .filter(|s| s.account_id == account_id && s.revoked_at.is_none())
        {
            session.revoked_at = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }
}

struct WindowSlot {
    count: u64,
    opened: Instant,
}

#[derive(Default)]
pub struct MemoryRateWindows {
    windows: Mutex<HashMap<String, WindowSlot>>,
}

impl MemoryRateWindows {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateWindowStore for MemoryRateWindows {
    async fn hit(&self, key: &str, window_secs: u64) -> Result<(u64, u64)> {
        let mut windows = self.windows.lock().await;
        let window = StdDuration::from_secs(window_secs);

        windows.retain(|_, slot| slot.opened.elapsed() < window);

        let slot = windows.entry(key.to_string()).or_insert(WindowSlot {
            count: 0,
            opened: Instant::now(),
        });
        slot.count += 1;

        let remaining = window_secs.saturating_sub(slot.opened.elapsed().as_secs());
        Ok((slot.count, remaining.max(1)))
    }
}

struct StateEntry {
    record: StateRecord,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryStateStore {
    states: Mutex<HashMap<String, StateEntry>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OAuthStateStore for MemoryStateStore {
    async fn put(&self, state: &str, record: &StateRecord, ttl_secs: u64) -> Result<()> {
        let mut states = self.states.lock().await;
        let now = Instant::now();
        states.retain(|_, entry| entry.expires_at > now);
        states.insert(
            state.to_string(),
            StateEntry {
                record: record.clone(),
                expires_at: now + StdDuration::from_secs(ttl_secs),
            },
        );
        Ok(())
    }

    async fn take(&self, state: &str) -> Result<Option<StateRecord>> {
        let mut states = self.states.lock().await;
        let Some(entry) = states.remove(state) else {
            return Ok(None);
        };
        if entry.expires_at > Instant::now() {
            Ok(Some(entry.record))
        } else {
            Ok(None)
        }
    }
}
