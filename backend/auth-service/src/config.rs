//! Configuration management for the auth service
//!
//! Loads settings from:
//! 1. Environment variables
//! 2. .env file (local development)

use anyhow::{Context, Result};
use std::env;
use tracing::info;

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub tokens: TokenSettings,
    pub sessions: SessionSettings,
    pub lockout: LockoutSettings,
    pub rate_limit: RateLimitSettings,
    pub oauth: OAuthSettings,
    pub security: SecuritySettings,
}

impl Settings {
    /// Load settings from environment variables (and .env in development)
    pub fn from_env() -> Result<Self> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            server: ServerSettings::from_env()?,
            database: DatabaseSettings::from_env()?,
            redis: RedisSettings::from_env()?,
            tokens: TokenSettings::from_env()?,
            sessions: SessionSettings::from_env()?,
            lockout: LockoutSettings::from_env()?,
            rate_limit: RateLimitSettings::from_env()?,
            oauth: OAuthSettings::from_env(),
            security: SecuritySettings::from_env()?,
        })
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid SERVER_PORT")?,
        })
    }
}

/// Database connection settings
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

impl DatabaseSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,
            min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .context("Invalid DATABASE_MIN_CONNECTIONS")?,
            acquire_timeout: env::var("DATABASE_ACQUIRE_TIMEOUT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DATABASE_ACQUIRE_TIMEOUT")?,
        })
    }
}

/// Redis settings (rate windows and OAuth state)
#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: String,
}

impl RedisSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("REDIS_URL").context("REDIS_URL must be set")?,
        })
    }
}

/// Signing secrets and lifetimes for the two token families
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl TokenSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            access_secret: env::var("ACCESS_TOKEN_SECRET")
                .context("ACCESS_TOKEN_SECRET must be set")?,
            refresh_secret: env::var("REFRESH_TOKEN_SECRET")
                .context("REFRESH_TOKEN_SECRET must be set")?,
            access_ttl_secs: env::var("ACCESS_TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .context("Invalid ACCESS_TOKEN_TTL_SECS")?,
            refresh_ttl_secs: env::var("REFRESH_TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "604800".to_string())
                .parse()
                .context("Invalid REFRESH_TOKEN_TTL_SECS")?,
        })
    }
}

/// Session lifetime and cookie settings
///
/// The absolute lifetime defaults to the access-token lifetime; the two are
/// configured independently on purpose.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub absolute_ttl_secs: i64,
    pub idle_timeout_secs: i64,
    pub cookie_secure: bool,
}

impl SessionSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            absolute_ttl_secs: env::var("SESSION_ABSOLUTE_TTL_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .context("Invalid SESSION_ABSOLUTE_TTL_SECS")?,
            idle_timeout_secs: env::var("SESSION_IDLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse()
                .context("Invalid SESSION_IDLE_TIMEOUT_SECS")?,
            // Set true behind TLS; browsers drop Secure cookies on plain http
            cookie_secure: env::var("SESSION_COOKIE_SECURE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("Invalid SESSION_COOKIE_SECURE")?,
        })
    }
}

/// Brute-force lockout policy
#[derive(Debug, Clone)]
pub struct LockoutSettings {
    pub max_attempts: i32,
    pub lockout_duration_secs: i64,
}

impl LockoutSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            max_attempts: env::var("LOCKOUT_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid LOCKOUT_MAX_ATTEMPTS")?,
            lockout_duration_secs: env::var("LOCKOUT_DURATION_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .context("Invalid LOCKOUT_DURATION_SECS")?,
        })
    }
}

/// Fixed-window rate limits per endpoint class
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub window_secs: u64,
    pub login_max: u64,
    pub register_max: u64,
    pub refresh_max: u64,
    pub oauth_max: u64,
    pub password_reset_max: u64,
}

impl RateLimitSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            window_secs: env::var("RATE_LIMIT_WINDOW_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("Invalid RATE_LIMIT_WINDOW_SECS")?,
            login_max: env::var("RATE_LIMIT_LOGIN_MAX")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid RATE_LIMIT_LOGIN_MAX")?,
            register_max: env::var("RATE_LIMIT_REGISTER_MAX")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid RATE_LIMIT_REGISTER_MAX")?,
            refresh_max: env::var("RATE_LIMIT_REFRESH_MAX")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("Invalid RATE_LIMIT_REFRESH_MAX")?,
            oauth_max: env::var("RATE_LIMIT_OAUTH_MAX")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid RATE_LIMIT_OAUTH_MAX")?,
            password_reset_max: env::var("RATE_LIMIT_PASSWORD_RESET_MAX")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid RATE_LIMIT_PASSWORD_RESET_MAX")?,
        })
    }
}

/// OAuth provider credentials (a provider is enabled when both values are set)
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub github_client_id: Option<String>,
    pub github_client_secret: Option<String>,
    pub state_ttl_secs: u64,
}

impl OAuthSettings {
    fn from_env() -> Self {
        Self {
            google_client_id: env::var("OAUTH_GOOGLE_CLIENT_ID").ok(),
            google_client_secret: env::var("OAUTH_GOOGLE_CLIENT_SECRET").ok(),
            github_client_id: env::var("OAUTH_GITHUB_CLIENT_ID").ok(),
            github_client_secret: env::var("OAUTH_GITHUB_CLIENT_SECRET").ok(),
            state_ttl_secs: env::var("OAUTH_STATE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(600),
        }
    }
}

/// Account-state gates applied at login
#[derive(Debug, Clone)]
pub struct SecuritySettings {
    pub require_verified_email: bool,
}

impl SecuritySettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            require_verified_email: env::var("REQUIRE_VERIFIED_EMAIL")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("Invalid REQUIRE_VERIFIED_EMAIL")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn token_settings_require_secrets() {
        env::remove_var("ACCESS_TOKEN_SECRET");
        env::remove_var("REFRESH_TOKEN_SECRET");

        assert!(TokenSettings::from_env().is_err());
    }

    #[test]
    #[serial]
    fn token_settings_apply_defaults() {
        env::set_var("ACCESS_TOKEN_SECRET", "access-secret");
        env::set_var("REFRESH_TOKEN_SECRET", "refresh-secret");
        env::remove_var("ACCESS_TOKEN_TTL_SECS");
        env::remove_var("REFRESH_TOKEN_TTL_SECS");

        let settings = TokenSettings::from_env().unwrap();
        assert_eq!(settings.access_ttl_secs, 900);
        assert_eq!(settings.refresh_ttl_secs, 604_800);

        env::remove_var("ACCESS_TOKEN_SECRET");
        env::remove_var("REFRESH_TOKEN_SECRET");
    }

    #[test]
    #[serial]
    fn lockout_settings_defaults() {
        env::remove_var("LOCKOUT_MAX_ATTEMPTS");
        env::remove_var("LOCKOUT_DURATION_SECS");

        let settings = LockoutSettings::from_env().unwrap();
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.lockout_duration_secs, 900);
    }

    #[test]
    #[serial]
    fn rate_limit_settings_overrides() {
        env::set_var("RATE_LIMIT_WINDOW_SECS", "30");
        env::set_var("RATE_LIMIT_LOGIN_MAX", "3");

        let settings = RateLimitSettings::from_env().unwrap();
        assert_eq!(settings.window_secs, 30);
        assert_eq!(settings.login_max, 3);
        assert_eq!(settings.register_max, 5); // Default

        env::remove_var("RATE_LIMIT_WINDOW_SECS");
        env::remove_var("RATE_LIMIT_LOGIN_MAX");
    }
}
