// ===== Credential Authentication Service =====
//
// Orchestrates the password flows: registration, login with brute-force
// lockout, token refresh against the server-side session, logout, and the
// password-reset round trip. Federated logins resolve their account in the
// OAuth service and then join this pipeline at `establish_session`.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use token_core::{TokenKind, TokenPair, TokenService};
use uuid::Uuid;

use crate::config::SecuritySettings;
use crate::error::{AuthError, Result};
use crate::metrics;
use crate::models::{
    Account, LoginRequest, RegisterRequest, RequestPasswordResetRequest, ResetPasswordRequest,
    Session,
};
use crate::security::{hash_password, verify_decoy, verify_password, LockoutGuard};
use crate::services::notify::SecurityNotifier;
use crate::services::sessions::SessionManager;
use crate::store::AccountStore;
use crate::validators::{normalize_email, password_policy_failure, validate_email};

const RESET_TOKEN_BYTES: usize = 32;
const RESET_TOKEN_TTL_SECS: i64 = 3600;

/// Result of a credential login or registration: the account, the session
/// that now backs it, and the token pair bound to that session.
pub struct AuthenticatedLogin {
    pub account: Account,
    pub session: Session,
    pub tokens: TokenPair,
}

/// Tokens minted by a refresh. The refresh token is only present when the
/// caller asked for rotation.
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    sessions: SessionManager,
    tokens: Arc<TokenService>,
    lockout: LockoutGuard,
    notifier: Arc<dyn SecurityNotifier>,
    require_verified_email: bool,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        sessions: SessionManager,
        tokens: Arc<TokenService>,
        lockout: LockoutGuard,
        notifier: Arc<dyn SecurityNotifier>,
        security: &SecuritySettings,
    ) -> Self {
        Self {
            accounts,
            sessions,
            tokens,
            lockout,
            notifier,
            require_verified_email: security.require_verified_email,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Create a password account and sign it straight in.
    pub async fn register(
        &self,
        req: RegisterRequest,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<AuthenticatedLogin> {
        metrics::inc_register_requests();

        let email = normalize_email(&req.email);
        if !validate_email(&email) {
            return Err(AuthError::Validation("invalid email address".to_string()));
        }
        if !req.accept_terms {
            return Err(AuthError::Validation(
                "terms of service must be accepted".to_string(),
            ));
        }
        if let Some(reason) = password_policy_failure(&req.password) {
            return Err(AuthError::WeakPassword(reason.to_string()));
        }

        let password_hash = hash_password(&req.password)?;
        let name = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
        let account = self
            .accounts
            .create_password_account(&email, &password_hash, name)
            .await?;

        tracing::info!(account_id = %account.id, "account registered");
        self.establish_session(&account, ip_address, user_agent)
            .await
    }

    /// Password login. Admission is decided from the lockout state before
    /// any hashing happens; unknown accounts burn the same verification
    /// work as known ones so the two are not separable by timing.
    pub async fn login(
        &self,
        req: LoginRequest,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<AuthenticatedLogin> {
        metrics::inc_login_requests();

        let email = normalize_email(&req.email);
        let now = Utc::now();

        let Some(account) = self.accounts.find_by_email(&email).await? else {
            verify_decoy(&req.password);
            metrics::inc_login_failures();
            return Err(AuthError::InvalidCredentials);
        };

        self.lockout.admit(&account, now)?;

        let Some(password_hash) = account.password_hash.as_deref() else {
            // Federated-only account; indistinguishable from a bad password
            verify_decoy(&req.password);
            metrics::inc_login_failures();
            return Err(AuthError::InvalidCredentials);
        };

        match verify_password(&req.password, password_hash) {
            Ok(()) => {}
            Err(AuthError::InvalidCredentials) => {
                return Err(self.failed_login(&account, now).await);
            }
            Err(other) => return Err(other),
        }

        if !account.is_active {
            return Err(AuthError::AccountDisabled);
        }
        if self.require_verified_email && !account.email_verified {
            return Err(AuthError::EmailUnverified);
        }

        let account = self.lockout.record_success(self.accounts.as_ref(), account.id).await?;
        self.establish_session(&account, ip_address, user_agent)
            .await
    }

    /// Open a session and mint the token pair bound to it. Shared by the
    /// password and federated login paths.
    pub async fn establish_session(
        &self,
        account: &Account,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<AuthenticatedLogin> {
        let session = self
            .sessions
            .create(account.id, ip_address, user_agent)
            .await?;
        let tokens = self
            .tokens
            .issue_pair(account.id, &account.role, session.id)?;
        Ok(AuthenticatedLogin {
            account: account.clone(),
            session,
            tokens,
        })
    }

    /// Exchange a refresh token for a fresh access token, sliding the
    /// backing session's activity window in the same step.
    pub async fn refresh(&self, refresh_token: &str, rotate: bool) -> Result<RefreshedTokens> {
        let claims = self.tokens.verify(refresh_token, TokenKind::Refresh)?;
        let account_id = claims.account_id()?;
        let session_id = claims.session_id.ok_or(AuthError::InvalidToken)?;

        let session = self
            .sessions
            .touch(session_id)
            .await?
            .ok_or(AuthError::SessionExpired)?;
        if session.account_id != account_id {
            return Err(AuthError::InvalidToken);
        }

        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if !account.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let access_token = self.tokens.issue_access(account.id, &account.role)?;
        let refresh_token = if rotate {
            Some(self.tokens.issue_refresh(account.id, session.id)?)
        } else {
            None
        };

        Ok(RefreshedTokens {
            access_token,
            refresh_token,
            expires_in: self.tokens.access_ttl().num_seconds(),
        })
    }

    /// End a session named by cookie or by refresh token. Idempotent:
    /// unknown, expired, and already-revoked sessions all land on `false`.
    pub async fn logout(
        &self,
        cookie_session: Option<Uuid>,
        refresh_token: Option<&str>,
    ) -> Result<bool> {
        let mut session_id = cookie_session;
        if session_id.is_none() {
            if let Some(token) = refresh_token {
                // Best effort: an unparseable token still logs out cleanly
                if let Ok(claims) = self.tokens.verify(token, TokenKind::Refresh) {
                    session_id = claims.session_id;
                }
            }
        }

        match session_id {
            Some(id) => self.sessions.revoke(id).await,
            None => Ok(false),
        }
    }

    /// Revoke every live session the account holds.
    pub async fn revoke_all_sessions(&self, account_id: Uuid) -> Result<u64> {
        let revoked = self.sessions.revoke_all(account_id).await?;
        tracing::info!(%account_id, revoked, "revoked all sessions");
        Ok(revoked)
    }

    /// Start a password reset. Responds identically whether or not the
    /// address has an account, so the endpoint cannot be used to probe for
    /// registered emails.
    pub async fn request_password_reset(&self, req: RequestPasswordResetRequest) -> Result<()> {
        let email = normalize_email(&req.email);
        let Some(account) = self.accounts.find_by_email(&email).await? else {
            return Ok(());
        };

        let token = generate_reset_token();
        let expires_at = Utc::now() + Duration::seconds(RESET_TOKEN_TTL_SECS);
        self.accounts
            .create_reset_token(account.id, &hash_reset_token(&token), expires_at)
            .await?;
        self.notifier
            .password_reset_requested(&account.email, &token, expires_at)
            .await;
        Ok(())
    }

    /// Complete a password reset. The token is single-use; a completed
    /// reset replaces the hash, clears any lockout, and revokes every
    /// session of the account.
    pub async fn reset_password(&self, req: ResetPasswordRequest) -> Result<()> {
        if let Some(reason) = password_policy_failure(&req.new_password) {
            return Err(AuthError::WeakPassword(reason.to_string()));
        }

        let account_id = self
            .accounts
            .consume_reset_token(&hash_reset_token(&req.token))
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        let password_hash = hash_password(&req.new_password)?;
        self.accounts.set_password_hash(account_id, &password_hash).await?;
        self.accounts.clear_lockout(account_id).await?;
        let revoked = self.sessions.revoke_all(account_id).await?;

        tracing::info!(%account_id, revoked, "password reset completed");
        Ok(())
    }

    /// Map a failed password to its caller-facing error, recording the
    /// attempt. Crossing the threshold on this very attempt already answers
    /// with the lock.
    async fn failed_login(&self, account: &Account, now: DateTime<Utc>) -> AuthError {
        metrics::inc_login_failures();
        match self
            .lockout
            .record_failure(self.accounts.as_ref(), account.id, now)
            .await
        {
            Ok(updated) => match updated.locked_until.filter(|until| *until > now) {
                Some(until) => {
                    metrics::inc_account_lockouts();
                    self.notifier.account_locked(&updated.email, until).await;
                    AuthError::AccountLocked { until }
                }
                None => AuthError::InvalidCredentials,
            },
            Err(err) => err,
        }
    }
}

fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

// Reset tokens are stored hashed; a database leak alone must not allow
// completing a reset.
fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
