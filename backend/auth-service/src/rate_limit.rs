//! Fixed-window rate limiting
//!
//! Counters are keyed by `(endpoint class, caller identifier)` where the
//! identifier is an IP address or a normalized email. The window is a hard
//! reset, not a slide: once it lapses the count starts over. Adjacent
//! windows therefore admit up to twice the nominal budget back to back,
//! which is accepted for abuse mitigation.

use std::sync::Arc;

use tracing::warn;

use crate::config::RateLimitSettings;
use crate::error::{AuthError, Result};
use crate::metrics;
use crate::store::RateWindowStore;

/// Endpoint classes with independent budgets. The two OAuth legs count
/// separately so a flood of callbacks cannot starve authorize, and vice
/// versa; they share one configured budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointClass {
    Login,
    Register,
    Refresh,
    OAuthAuthorize,
    OAuthCallback,
    PasswordReset,
}

impl EndpointClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointClass::Login => "login",
            EndpointClass::Register => "register",
            EndpointClass::Refresh => "refresh",
            EndpointClass::OAuthAuthorize => "oauth_authorize",
            EndpointClass::OAuthCallback => "oauth_callback",
            EndpointClass::PasswordReset => "password_reset",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied { retry_after: u64 },
}

pub struct RateLimiter {
    store: Arc<dyn RateWindowStore>,
    window_secs: u64,
    login_max: u64,
    register_max: u64,
    refresh_max: u64,
    oauth_max: u64,
    password_reset_max: u64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateWindowStore>, settings: &RateLimitSettings) -> Self {
        Self {
            store,
            window_secs: settings.window_secs,
            login_max: settings.login_max,
            register_max: settings.register_max,
            refresh_max: settings.refresh_max,
            oauth_max: settings.oauth_max,
            password_reset_max: settings.password_reset_max,
        }
    }

    fn max_for(&self, class: EndpointClass) -> u64 {
        match class {
            EndpointClass::Login => self.login_max,
            EndpointClass::Register => self.register_max,
            EndpointClass::Refresh => self.refresh_max,
            EndpointClass::OAuthAuthorize | EndpointClass::OAuthCallback => self.oauth_max,
            EndpointClass::PasswordReset => self.password_reset_max,
        }
    }

    /// Count one attempt against the caller's window.
    pub async fn check_and_increment(
        &self,
        identifier: &str,
        class: EndpointClass,
    ) -> Decision {
        let key = format!("{}:{}", class.as_str(), identifier);

        match self.store.hit(&key, self.window_secs).await {
            Ok((count, remaining)) => {
                if count > self.max_for(class) {
                    metrics::inc_rate_limit_denials();
                    Decision::Denied {
                        retry_after: remaining.min(self.window_secs),
                    }
                } else {
                    Decision::Allowed
                }
            }
            Err(e) => {
                // Counting is best-effort: an unreachable counter store must
                // not take authentication down with it
                warn!("Rate limit store unavailable, admitting request: {}", e);
                Decision::Allowed
            }
        }
    }

    /// Same check, mapped onto the wire error for handler use.
    pub async fn enforce(&self, identifier: &str, class: EndpointClass) -> Result<()> {
        match self.check_and_increment(identifier, class).await {
            Decision::Allowed => Ok(()),
            Decision::Denied { retry_after } => Err(AuthError::RateLimited { retry_after }),
        }
    }
}
