//! Signed, expiring bearer tokens.
//!
//! Access and refresh tokens are signed with independent secrets and carry
//! independent lifetimes, so a token of one kind never verifies as the other.
//! Verification is purely cryptographic and never touches storage.

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Token kind, embedded in the claims as `typ`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived, stateless, sent on every authenticated request
    Access,
    /// Long-lived, valid only while present in the owner's session set
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// Default access token lifetime: 15 minutes
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Default refresh token lifetime: 1 week
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// JWT claims shared by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user UUID)
    pub sub: String,
    /// Issue time in milliseconds
    pub ts: u64,
    /// Random salt so two tokens minted in the same millisecond still differ
    pub jti: String,
    #[serde(rename = "typ")]
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Secret material and lifetime for one token kind.
#[derive(Clone)]
pub struct TokenKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }
}

/// Process-wide token configuration, built once at startup.
///
/// Either kind may be left unconfigured; operations that need it then fail
/// with [`JwtError::NotConfigured`].
#[derive(Clone, Default)]
pub struct JwtConfig {
    access: Option<TokenKeys>,
    refresh: Option<TokenKeys>,
}

impl JwtConfig {
    pub fn new(access: Option<TokenKeys>, refresh: Option<TokenKeys>) -> Self {
        Self { access, refresh }
    }

    /// Both kinds configured with the default lifetimes.
    pub fn with_secrets(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self::new(
            Some(TokenKeys::new(access_secret, DEFAULT_ACCESS_TTL)),
            Some(TokenKeys::new(refresh_secret, DEFAULT_REFRESH_TTL)),
        )
    }

    #[cfg(test)]
    pub(crate) fn is_configured(&self, kind: TokenKind) -> bool {
        self.keys(kind).is_ok()
    }

    fn keys(&self, kind: TokenKind) -> Result<&TokenKeys, JwtError> {
        let keys = match kind {
            TokenKind::Access => self.access.as_ref(),
            TokenKind::Refresh => self.refresh.as_ref(),
        };
        keys.ok_or(JwtError::NotConfigured(kind))
    }

    /// Sign a new token of the given kind for `subject`.
    pub fn issue(&self, subject: &str, kind: TokenKind) -> Result<String, JwtError> {
        let keys = self.keys(kind)?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| JwtError::Time)?;
        let iat = now.as_secs();

        let claims = Claims {
            sub: subject.to_string(),
            ts: now.as_millis() as u64,
            jti: uuid::Uuid::new_v4().to_string(),
            kind,
            iat,
            exp: iat + keys.ttl.as_secs(),
        };

        jsonwebtoken::encode(&Header::default(), &claims, &keys.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Check signature, expiry and kind. Returns the decoded claims.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, JwtError> {
        let keys = self.keys(kind)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<Claims>(token, &keys.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::InvalidSignature,
            })?;

        if data.claims.kind != kind {
            return Err(JwtError::WrongKind { expected: kind });
        }

        Ok(data.claims)
    }
}

/// Errors that can occur during token operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("{0} token secret is not configured")]
    NotConfigured(TokenKind),
    #[error("invalid token")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("expected a {expected} token")]
    WrongKind { expected: TokenKind },
    #[error("failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("system time error")]
    Time,
}
