use chrono::{DateTime, Utc};
/// OAuth models
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    #[serde(rename = "google")]
    Google,
    #[serde(rename = "github")]
    GitHub,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::GitHub => "github",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "google" => Some(OAuthProvider::Google),
            "github" => Some(OAuthProvider::GitHub),
            _ => None,
        }
    }
}

/// Provider-agnostic profile assembled from the provider's user-info payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedProfile {
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub email_verified: Option<bool>,
}

/// Credentials the provider granted at code exchange. Expiry and refresh
/// token are absent for providers that issue non-expiring tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Everything a completed code exchange yields
#[derive(Debug, Clone)]
pub struct FederatedIdentity {
    pub profile: NormalizedProfile,
    pub tokens: ProviderTokens,
}

/// Link between a local account and one federated identity. The profile
/// columns are a snapshot taken at link creation; only the provider token
/// columns change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OAuthLink {
    pub id: Uuid,
    pub account_id: Uuid,
    pub provider: String,
    pub provider_subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub provider_access_token: String,
    pub provider_refresh_token: Option<String>,
    pub provider_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload parked server-side under the opaque state nonce
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateRecord {
    pub provider: String,
    pub redirect_uri: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeQuery {
    pub provider: String,
    pub redirect_uri: String,
}

// code and state stay optional at the type level so their absence surfaces
// as the uniform 400 body instead of an extractor rejection
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallbackQuery {
    pub provider: String,
    pub code: Option<String>,
    pub state: Option<String>,
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeResponse {
    pub auth_url: String,
    pub state: String,
}
