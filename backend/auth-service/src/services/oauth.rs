// ===== OAuth Federation Service =====
//
// Drives the authorization-code flow against Google and GitHub. The state
// nonce parked at authorize time is consumed in a single read on callback,
// so a replayed or forged state can never pass twice. Account resolution
// runs link first, then verified email, then a fresh federated account.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::config::OAuthSettings;
use crate::error::{AuthError, Result};
use crate::metrics;
use crate::models::{
    Account, CallbackQuery, FederatedIdentity, NormalizedProfile, OAuthProvider, ProviderTokens,
    StateRecord,
};
use crate::store::{AccountStore, OAuthStateStore};
use crate::validators::normalize_email;

const GITHUB_USER_AGENT: &str = "beacon-auth-service";

/// One upstream identity provider: builds its authorize URL and turns an
/// authorization code into a normalized profile plus the granted tokens.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn provider(&self) -> OAuthProvider;

    fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<String>;

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<FederatedIdentity>;
}

pub struct OAuthFederator {
    accounts: Arc<dyn AccountStore>,
    states: Arc<dyn OAuthStateStore>,
    providers: Vec<Arc<dyn ProviderClient>>,
    state_ttl_secs: u64,
}

impl OAuthFederator {
    /// Wire up the providers that have credentials configured; the rest
    /// simply do not exist as far as the API is concerned.
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        states: Arc<dyn OAuthStateStore>,
        settings: &OAuthSettings,
    ) -> Self {
        let mut providers: Vec<Arc<dyn ProviderClient>> = Vec::new();
        if let (Some(client_id), Some(client_secret)) = (
            settings.google_client_id.clone(),
            settings.google_client_secret.clone(),
        ) {
            providers.push(Arc::new(GoogleClient::new(client_id, client_secret)));
        }
        if let (Some(client_id), Some(client_secret)) = (
            settings.github_client_id.clone(),
            settings.github_client_secret.clone(),
        ) {
            providers.push(Arc::new(GitHubClient::new(client_id, client_secret)));
        }
        Self::with_providers(accounts, states, providers, settings.state_ttl_secs)
    }

    pub fn with_providers(
        accounts: Arc<dyn AccountStore>,
        states: Arc<dyn OAuthStateStore>,
        providers: Vec<Arc<dyn ProviderClient>>,
        state_ttl_secs: u64,
    ) -> Self {
        Self {
            accounts,
            states,
            providers,
            state_ttl_secs,
        }
    }

    /// Start a flow: mint an unguessable state, park it with the provider
    /// and redirect target, and hand back the provider's authorize URL.
    pub async fn authorize(
        &self,
        provider: OAuthProvider,
        redirect_uri: &str,
    ) -> Result<(String, String)> {
        let client = self.client_for(provider)?;
        validate_redirect_uri(redirect_uri)?;

        let state = Uuid::new_v4().to_string();
        let record = StateRecord {
            provider: provider.as_str().to_string(),
            redirect_uri: redirect_uri.to_string(),
            created_at: Utc::now(),
        };
        self.states.put(&state, &record, self.state_ttl_secs).await?;

        let auth_url = client.authorize_url(redirect_uri, &state)?;
        Ok((auth_url, state))
    }

    /// Complete a flow. The state is consumed before anything else is
    /// trusted; provider mismatch, expiry, and replay all collapse into the
    /// same invalid-state refusal.
    pub async fn callback(&self, query: &CallbackQuery) -> Result<(Account, bool)> {
        let provider = OAuthProvider::from_str(&query.provider)
            .ok_or_else(|| AuthError::InvalidOAuthProvider(query.provider.clone()))?;
        let client = self.client_for(provider)?;

        let code = query
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::Validation("code is required".to_string()))?;
        let state = query
            .state
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::Validation("state is required".to_string()))?;

        let record = self
            .states
            .take(state)
            .await?
            .ok_or(AuthError::InvalidOAuthState)?;
        if record.provider != provider.as_str() {
            return Err(AuthError::InvalidOAuthState);
        }
        // A relayed redirectUri must agree with the one the state was
        // parked for; the stored value is what drives the exchange either way
        if let Some(uri) = query.redirect_uri.as_deref().filter(|u| !u.is_empty()) {
            if uri != record.redirect_uri {
                return Err(AuthError::InvalidOAuthState);
            }
        }

        let identity = client.exchange_code(code, &record.redirect_uri).await?;
        let (account, created) = self.resolve_account(provider, &identity).await?;
        if !account.is_active {
            return Err(AuthError::AccountDisabled);
        }

        metrics::inc_oauth_logins();
        tracing::info!(
            account_id = %account.id,
            provider = provider.as_str(),
            created,
            "federated login completed"
        );
        Ok((account, created))
    }

    /// Link first, then email, then a fresh account. The subject claim is
    /// the stable identity; email is only a join hint for first contact.
    /// A known link only has its provider tokens rewritten.
    async fn resolve_account(
        &self,
        provider: OAuthProvider,
        identity: &FederatedIdentity,
    ) -> Result<(Account, bool)> {
        let profile = &identity.profile;
        if let Some(link) = self
            .accounts
            .find_link(provider.as_str(), &profile.subject)
            .await?
        {
            let account = self
                .accounts
                .find_by_id(link.account_id)
                .await?
                .ok_or_else(|| {
                    AuthError::Database("oauth link points at a missing account".to_string())
                })?;
            self.accounts
                .refresh_link_tokens(link.id, &identity.tokens)
                .await?;
            return Ok((account, false));
        }

        let email = profile
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty())
            .ok_or(AuthError::OAuthEmailMissing)?;

        let (account, created) = match self.accounts.find_by_email(&email).await? {
            Some(account) => (account, false),
            None => {
                let verified = profile.email_verified.unwrap_or(false);
                let account = self
                    .accounts
                    .create_federated_account(&email, profile.name.as_deref(), verified)
                    .await?;
                tracing::info!(
                    account_id = %account.id,
                    provider = provider.as_str(),
                    "account created from federated profile"
                );
                (account, true)
            }
        };

        self.accounts
            .create_link(
                account.id,
                provider.as_str(),
                &profile.subject,
                Some(&email),
                profile.name.as_deref(),
                &identity.tokens,
            )
            .await?;
        Ok((account, created))
    }

    fn client_for(&self, provider: OAuthProvider) -> Result<&dyn ProviderClient> {
        self.providers
            .iter()
            .find(|c| c.provider() == provider)
            .map(|c| c.as_ref())
            .ok_or_else(|| AuthError::InvalidOAuthProvider(provider.as_str().to_string()))
    }
}

fn validate_redirect_uri(redirect_uri: &str) -> Result<()> {
    let parsed = Url::parse(redirect_uri)
        .map_err(|_| AuthError::Validation("redirectUri must be an absolute URL".to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(AuthError::Validation(
            "redirectUri must use http or https".to_string(),
        ));
    }
    Ok(())
}

// ===== Google =====

pub struct GoogleClient {
    client_id: String,
    client_secret: String,
    http: Client,
}

impl GoogleClient {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            http: Client::new(),
        }
    }
}

#[async_trait]
impl ProviderClient for GoogleClient {
    fn provider(&self) -> OAuthProvider {
        OAuthProvider::Google
    }

    fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<String> {
        let mut url = Url::parse("https://accounts.google.com/o/oauth2/v2/auth")
            .expect("valid google auth url");
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", "openid email profile")
            .append_pair("state", state);
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<FederatedIdentity> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            refresh_token: Option<String>,
            expires_in: Option<i64>,
        }

        #[derive(Deserialize)]
        struct GoogleUserInfo {
            sub: String,
            email: Option<String>,
            name: Option<String>,
            email_verified: Option<bool>,
        }

        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        let token_resp = self
            .http
            .post("https://oauth2.googleapis.com/token")
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::OAuthUpstream(format!("Google token request failed: {e}")))?;

        if !token_resp.status().is_success() {
            return Err(AuthError::OAuthUpstream(format!(
                "Google token request failed with status {}",
                token_resp.status()
            )));
        }

        let token: TokenResponse = token_resp.json().await.map_err(|e| {
            AuthError::OAuthUpstream(format!("Failed to parse Google token response: {e}"))
        })?;

        let user_resp = self
            .http
            .get("https://openidconnect.googleapis.com/v1/userinfo")
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| {
                AuthError::OAuthUpstream(format!("Failed to fetch Google user info: {e}"))
            })?;

        if !user_resp.status().is_success() {
            return Err(AuthError::OAuthUpstream(format!(
                "Google userinfo failed with status {}",
                user_resp.status()
            )));
        }

        let user: GoogleUserInfo = user_resp.json().await.map_err(|e| {
            AuthError::OAuthUpstream(format!("Failed to parse Google user info: {e}"))
        })?;

        Ok(FederatedIdentity {
            profile: NormalizedProfile {
                subject: user.sub,
                email: user.email,
                name: user.name,
                email_verified: user.email_verified,
            },
            tokens: ProviderTokens {
                access_token: token.access_token,
                refresh_token: token.refresh_token,
                expires_at: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
            },
        })
    }
}

// ===== GitHub =====

pub struct GitHubClient {
    client_id: String,
    client_secret: String,
    http: Client,
}

impl GitHubClient {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            http: Client::new(),
        }
    }
}

#[async_trait]
impl ProviderClient for GitHubClient {
    fn provider(&self) -> OAuthProvider {
        OAuthProvider::GitHub
    }

    fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<String> {
        let mut url = Url::parse("https://github.com/login/oauth/authorize")
            .expect("valid github auth url");
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", "read:user user:email")
            .append_pair("state", state);
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<FederatedIdentity> {
        // refresh_token and expires_in only appear when the app is set up
        // with expiring user tokens
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            refresh_token: Option<String>,
            expires_in: Option<i64>,
        }

        #[derive(Deserialize)]
        struct GitHubUser {
            id: i64,
            login: String,
            name: Option<String>,
            email: Option<String>,
        }

        #[derive(Deserialize)]
        struct GitHubEmail {
            email: String,
            primary: bool,
            verified: bool,
        }

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        let token_resp = self
            .http
            .post("https://github.com/login/oauth/access_token")
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::OAuthUpstream(format!("GitHub token request failed: {e}")))?;

        if !token_resp.status().is_success() {
            return Err(AuthError::OAuthUpstream(format!(
                "GitHub token request failed with status {}",
                token_resp.status()
            )));
        }

        let token: TokenResponse = token_resp.json().await.map_err(|e| {
            AuthError::OAuthUpstream(format!("Failed to parse GitHub token response: {e}"))
        })?;

        let user_resp = self
            .http
            .get("https://api.github.com/user")
            .header(reqwest::header::USER_AGENT, GITHUB_USER_AGENT)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| {
                AuthError::OAuthUpstream(format!("Failed to fetch GitHub user info: {e}"))
            })?;

        if !user_resp.status().is_success() {
            return Err(AuthError::OAuthUpstream(format!(
                "GitHub user endpoint failed with status {}",
                user_resp.status()
            )));
        }

        let user: GitHubUser = user_resp.json().await.map_err(|e| {
            AuthError::OAuthUpstream(format!("Failed to parse GitHub user info: {e}"))
        })?;

        // The profile email is often withheld; the emails endpoint carries
        // the verified addresses.
        let (email, email_verified) = match user.email {
            Some(email) => (Some(email), None),
            None => {
                let emails_resp = self
                    .http
                    .get("https://api.github.com/user/emails")
                    .header(reqwest::header::USER_AGENT, GITHUB_USER_AGENT)
                    .bearer_auth(&token.access_token)
                    .send()
                    .await
                    .map_err(|e| {
                        AuthError::OAuthUpstream(format!("Failed to fetch GitHub emails: {e}"))
                    })?;

                if !emails_resp.status().is_success() {
                    return Err(AuthError::OAuthUpstream(format!(
                        "GitHub emails endpoint failed with status {}",
                        emails_resp.status()
                    )));
                }

                let emails: Vec<GitHubEmail> = emails_resp.json().await.map_err(|e| {
                    AuthError::OAuthUpstream(format!("Failed to parse GitHub emails: {e}"))
                })?;

                let picked = emails
                    .iter()
                    .find(|e| e.primary && e.verified)
                    .or_else(|| emails.iter().find(|e| e.verified));
                match picked {
                    Some(entry) => (Some(entry.email.clone()), Some(true)),
                    None => (None, None),
                }
            }
        };

        Ok(FederatedIdentity {
            profile: NormalizedProfile {
                subject: user.id.to_string(),
                email,
                name: user.name.or(Some(user.login)),
                email_verified,
            },
            tokens: ProviderTokens {
                access_token: token.access_token,
                refresh_token: token.refresh_token,
                expires_at: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
            },
        })
    }
}
