/// Shared token module for Beacon services
///
/// Issues and verifies the two token families used across the platform:
/// short-lived access tokens carried on API requests, and longer-lived
/// refresh tokens bound to a server-side session. Both are HS256-signed
/// JWTs, each family with its own signing secret, so a leaked refresh
/// secret cannot mint access tokens and vice versa.
///
/// ## Security Design
///
/// - **Distinct secrets per family**: access and refresh tokens never
///   verify against each other's key.
/// - **Type claim re-checked**: the `type` claim is validated after
///   signature verification, guarding deployments that configure both
///   families with the same secret.
/// - **Closed failure set**: verification reports exactly one of
///   `Malformed`, `SignatureInvalid`, `Expired`, `WrongType`, so callers
///   can branch on the kind without string matching.
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

// ============================================================================
// Data Structures
// ============================================================================

/// The two token families. The wire value lives in the `type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }

    fn other(self) -> TokenKind {
        match self {
            TokenKind::Access => TokenKind::Refresh,
            TokenKind::Refresh => TokenKind::Access,
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims shared by both families.
///
/// Access tokens carry `role`, refresh tokens carry `sessionId`; the
/// unused field stays off the wire entirely.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (account ID as UUID string)
    pub sub: String,
    /// Account role, access tokens only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Session the token is bound to, refresh tokens only
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    /// Token family: "access" or "refresh"
    #[serde(rename = "type")]
    pub token_type: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Parse the subject back into an account ID.
    pub fn account_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Malformed)
    }
}

/// Token pair handed out after a successful authentication.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Not a structurally valid JWT, or claims that do not deserialize
    #[error("token is malformed")]
    Malformed,
    /// Signature does not verify under the expected family's secret
    #[error("token signature is invalid")]
    SignatureInvalid,
    /// Signature valid but the token's lifetime has elapsed
    #[error("token has expired")]
    Expired,
    /// A valid token of the other family was presented
    #[error("token type does not match the expected family")]
    WrongType,
    /// Signing failed; never caused by caller input
    #[error("failed to sign token: {0}")]
    Signing(String),
}

// ============================================================================
// Token Service
// ============================================================================

struct Family {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Family {
    fn from_secret(secret: &str, ttl: Duration) -> Self {
        Family {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

/// Issues and verifies both token families.
///
/// One instance per process, constructed from configuration at startup and
/// shared behind the application state. Stateless beyond the two keys.
pub struct TokenService {
    access: Family,
    refresh: Family,
}

impl TokenService {
    /// Build a service from the two family secrets and lifetimes.
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        TokenService {
            access: Family::from_secret(access_secret, access_ttl),
            refresh: Family::from_secret(refresh_secret, refresh_ttl),
        }
    }

    /// Access-token lifetime, surfaced to clients as `expiresIn`.
    pub fn access_ttl(&self) -> Duration {
        self.access.ttl
    }

    /// Refresh-token lifetime.
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh.ttl
    }

    fn family(&self, kind: TokenKind) -> &Family {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = true;
        validation
    }

    /// Sign a new access token for `account_id` with its role embedded.
    pub fn issue_access(&self, account_id: Uuid, role: &str) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: account_id.to_string(),
            role: Some(role.to_string()),
            session_id: None,
            token_type: TokenKind::Access.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + self.access.ttl).timestamp(),
        };
        self.sign(TokenKind::Access, &claims)
    }

    /// Sign a new refresh token bound to `session_id`.
    ///
    /// Revoking that session is what retires the token early; the token
    /// itself is never persisted.
    pub fn issue_refresh(&self, account_id: Uuid, session_id: Uuid) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: account_id.to_string(),
            role: None,
            session_id: Some(session_id),
            token_type: TokenKind::Refresh.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + self.refresh.ttl).timestamp(),
        };
        self.sign(TokenKind::Refresh, &claims)
    }

    /// Issue both tokens in one call, the usual post-login shape.
    pub fn issue_pair(
        &self,
        account_id: Uuid,
        role: &str,
        session_id: Uuid,
    ) -> Result<TokenPair, TokenError> {
        let access_token = self.issue_access(account_id, role)?;
        let refresh_token = self.issue_refresh(account_id, session_id)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access.ttl.num_seconds(),
        })
    }

    fn sign(&self, kind: TokenKind, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(JWT_ALGORITHM), claims, &self.family(kind).encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify `token` as a member of the `expected` family.
    ///
    /// Rejection precedence: structure, then signature, then expiry, then
    /// type. Because the families use distinct secrets, a well-signed token
    /// of the *other* family fails the signature check here; it is probed
    /// against the sibling key (expiry ignored) so the caller still sees
    /// `WrongType` instead of `SignatureInvalid` for type confusion.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        match decode::<Claims>(token, &self.family(expected).decoding, &Self::validation()) {
            Ok(data) => {
                // Re-check the type claim: with identical family secrets the
                // signature alone cannot tell the families apart.
                if data.claims.token_type != expected.as_str() {
                    return Err(TokenError::WrongType);
                }
                Ok(data.claims)
            }
            Err(err) => {
                let classified = classify(&err);
                if classified != TokenError::SignatureInvalid {
                    return Err(classified);
                }
                let sibling = expected.other();
                let mut relaxed = Self::validation();
                relaxed.validate_exp = false;
                match decode::<Claims>(token, &self.family(sibling).decoding, &relaxed) {
                    Ok(data) if data.claims.token_type == sibling.as_str() => {
                        Err(TokenError::WrongType)
                    }
                    _ => Err(TokenError::SignatureInvalid),
                }
            }
        }
    }
}

fn classify(err: &jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            TokenError::SignatureInvalid
        }
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::MissingRequiredClaim(_) => TokenError::Malformed,
        _ => TokenError::Malformed,
    }
}

// ============================================================================
// Tests
// ============================================================================
