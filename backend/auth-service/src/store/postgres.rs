use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::models::{Account, OAuthLink, ProviderTokens, Session};

use super::{AccountStore, SessionStore};

/// SQLSTATE 23505
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}

#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn create_password_account(
        &self,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> Result<Account> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, email, password_hash, name, role, is_active, email_verified, failed_login_attempts, created_at, updated_at)
            VALUES (gen_random_uuid(), $1, $2, $3, 'member', true, false, 0, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::EmailAlreadyExists
            } else {
                AuthError::from(e)
            }
        })
    }

    async fn create_federated_account(
        &self,
        email: &str,
        name: Option<&str>,
        email_verified: bool,
    ) -> Result<Account> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, email, password_hash, name, role, is_active, email_verified, failed_login_attempts, created_at, updated_at)
            VALUES (gen_random_uuid(), $1, NULL, $2, 'member', true, $3, 0, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(name)
        .bind(email_verified)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::EmailAlreadyExists
            } else {
                AuthError::from(e)
            }
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT * FROM accounts WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT * FROM accounts WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn record_login_failure(
        &self,
        id: Uuid,
        max_attempts: i32,
        locked_until: DateTime<Utc>,
    ) -> Result<Account> {
        // Increment and lock decision happen in one statement so racing
        // failures cannot lose counts.
        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET failed_login_attempts = failed_login_attempts + 1,
                locked_until = CASE
                    WHEN failed_login_attempts + 1 >= $2 THEN $3
                    ELSE locked_until
                END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(max_attempts)
        .bind(locked_until)
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }

    async fn record_login_success(&self, id: Uuid) -> Result<Account> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET failed_login_attempts = 0,
                locked_until = NULL,
                last_login_at = CURRENT_TIMESTAMP,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts SET password_hash = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2
            "#,
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear_lockout(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET failed_login_attempts = 0,
                locked_until = NULL,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_link(
        &self,
        provider: &str,
        provider_subject: &str,
    ) -> Result<Option<OAuthLink>> {
        let link = sqlx::query_as::<_, OAuthLink>(
            r#"
            SELECT * FROM oauth_links WHERE provider = $1 AND provider_subject = $2
            "#,
        )
        .bind(provider)
        .bind(provider_subject)
        .fetch_optional(&self.pool)
        .await?;

        Ok(link)
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
        let link = sqlx::query_as::<_, OAuthLink>(
            r#"
            INSERT INTO oauth_links (
                id, account_id, provider, provider_subject, email, name,
                provider_access_token, provider_refresh_token, provider_token_expires_at,
                created_at, updated_at
            )
            VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, $7, $8, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(provider)
        .bind(provider_subject)
        .bind(email)
        .bind(name)
        .bind(&tokens.access_token)
        .bind(tokens.refresh_token.as_deref())
        .bind(tokens.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::OAuthLinkConflict(provider.to_string())
            } else {
                AuthError::from(e)
            }
        })?;

        Ok(link)
    }

    async fn refresh_link_tokens(&self, link_id: Uuid, tokens: &ProviderTokens) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE oauth_links
            SET provider_access_token = $2,
                provider_refresh_token = $3,
                provider_token_expires_at = $4,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            "#,
        )
        .bind(link_id)
        .bind(&tokens.access_token)
        .bind(tokens.refresh_token.as_deref())
        .bind(tokens.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_reset_token(
        &self,
        account_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        // A fresh request supersedes any token still outstanding
        sqlx::query(
            r#"
            UPDATE password_reset_tokens SET used_at = CURRENT_TIMESTAMP
            WHERE account_id = $1 AND used_at IS NULL
            "#,
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (id, account_id, token_hash, expires_at, used_at, created_at)
            VALUES (gen_random_uuid(), $1, $2, $3, NULL, CURRENT_TIMESTAMP)
            "#,
        )
        .bind(account_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn consume_reset_token(&self, token_hash: &str) -> Result<Option<Uuid>> {
        let account_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE password_reset_tokens
            SET used_at = CURRENT_TIMESTAMP
            WHERE token_hash = $1 AND used_at IS NULL AND expires_at > CURRENT_TIMESTAMP
            RETURNING account_id
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account_id)
    }
}

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session: Session) -> Result<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, account_id, created_at, last_activity_at, absolute_expires_at, revoked_at, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(session.id)
        .bind(session.account_id)
        .bind(session.created_at)
        .bind(session.last_activity_at)
        .bind(session.absolute_expires_at)
        .bind(session.revoked_at)
        .bind(session.ip_address)
        .bind(session.user_agent)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT * FROM sessions WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn touch(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        idle_cutoff: DateTime<Utc>,
        absolute_expiry: DateTime<Utc>,
    ) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            UPDATE sessions
            SET last_activity_at = $2, absolute_expires_at = $4
            WHERE id = $1
              AND revoked_at IS NULL
              AND absolute_expires_at > $2
              AND last_activity_at > $3
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(idle_cutoff)
        .bind(absolute_expiry)
        .fetch_optional(&self.pool)
        .await?;

        if session.is_none() {
            // Lazy cleanup of the corpse; a miss on an unknown id matches zero rows
            sqlx::query(
                r#"
                DELETE FROM sessions
                WHERE id = $1
                  AND (revoked_at IS NOT NULL OR absolute_expires_at <= $2 OR last_activity_at <= $3)
                "#,
            )
            .bind(id)
            .bind(now)
            .bind(idle_cutoff)
            .execute(&self.pool)
            .await?;
        }

        Ok(session)
    }

    async fn revoke(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET revoked_at = CURRENT_TIMESTAMP WHERE id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all_for_account(&self, account_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET revoked_at = CURRENT_TIMESTAMP WHERE account_id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
