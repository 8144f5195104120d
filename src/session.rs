//! Account and session lifecycle.
//!
//! Registration and login create accounts and sessions; refresh rotates a
//! session's refresh token; logout ends one session. A refresh token that is
//! well-signed but no longer in its owner's set has been used before, which is
//! taken as a sign of theft: every session of that user is revoked.

use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::{Database, NewUser, Redemption, User, is_unique_violation};
use crate::jwt::{JwtConfig, JwtError, TokenKind};
use crate::password::{
    PasswordError, UNUSABLE_HASH, hash_password_async, verify_password_async,
};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// Registration input. Every field is required; they are optional here so
/// absence can be reported as a validation error rather than a parse error.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub user: User,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("missing required fields")]
    MissingFields,
    #[error("malformed email address")]
    MalformedEmail,
    #[error("user already exists")]
    AlreadyExists,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("no refresh token provided")]
    MissingToken,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("refresh token revoked")]
    Revoked,
    #[error("{0} token secret is not configured")]
    Config(TokenKind),
    #[error("token error: {0}")]
    Token(JwtError),
    #[error("password hashing error: {0}")]
    Hash(#[from] PasswordError),
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl From<JwtError> for SessionError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::NotConfigured(kind) => SessionError::Config(kind),
            JwtError::Expired => SessionError::Expired,
            JwtError::InvalidSignature | JwtError::WrongKind { .. } => {
                SessionError::InvalidSignature
            }
            e @ (JwtError::Encoding(_) | JwtError::Time) => SessionError::Token(e),
        }
    }
}

/// Returns the value if present and non-empty.
fn required(value: Option<String>) -> Result<String, SessionError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(SessionError::MissingFields)
}

#[derive(Clone)]
pub struct SessionManager {
    db: Database,
    jwt: Arc<JwtConfig>,
}

impl SessionManager {
    pub fn new(db: Database, jwt: Arc<JwtConfig>) -> Self {
        Self { db, jwt }
    }

    /// Create an account with no sessions.
    pub async fn register(&self, input: Registration) -> Result<User, SessionError> {
        let email = required(input.email)?;
        let password = required(input.password)?;
        let first_name = required(input.first_name)?;
        let last_name = required(input.last_name)?;
        let username = required(input.username)?;

        if !EMAIL_RE.is_match(&email) {
            return Err(SessionError::MalformedEmail);
        }

        if self.db.users().email_exists(&email).await? {
            return Err(SessionError::AlreadyExists);
        }

        let password_hash = hash_password_async(password).await?;

        let new_user = NewUser {
            email,
            password_hash,
            first_name,
            last_name,
            username,
        };

        // A concurrent registration may have taken the email since the check above
        let user = self.db.users().create(&new_user).await.map_err(|e| {
            if is_unique_violation(&e) {
                SessionError::AlreadyExists
            } else {
                SessionError::Store(e)
            }
        })?;

        info!(user = %user.uuid, "User registered");
        Ok(user)
    }

    /// Start a new session. Existing sessions of the user stay valid.
    pub async fn login(
        &self,
        email: Option<String>,
        password: Option<String>,
    ) -> Result<LoginOutcome, SessionError> {
        let email = required(email)?;
        let password = required(password)?;

        // Unknown email and wrong password are indistinguishable to the caller,
        // including in how long the answer takes
        let Some(user) = self.db.users().get_by_email(&email).await? else {
            verify_password_async(password, UNUSABLE_HASH.to_string()).await?;
            return Err(SessionError::InvalidCredentials);
        };

        if !verify_password_async(password, user.password_hash.clone()).await? {
            return Err(SessionError::InvalidCredentials);
        }

        let tokens = self.issue_pair(&user.uuid)?;
        self.db.tokens().add(user.id, &tokens.refresh_token).await?;

        info!(user = %user.uuid, "User logged in");
        Ok(LoginOutcome { tokens, user })
    }

    /// Exchange a live refresh token for a new access/refresh pair.
    /// The presented token is consumed.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<TokenPair, SessionError> {
        let (user, token) = self.authenticate_refresh(refresh_token).await?;

        let tokens = self.issue_pair(&user.uuid)?;
        self.redeem(&user, token, Some(tokens.refresh_token.as_str()))
            .await?;

        info!(user = %user.uuid, "Refresh token rotated");
        Ok(tokens)
    }

    /// End the session owning `refresh_token`.
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<(), SessionError> {
        let (user, token) = self.authenticate_refresh(refresh_token).await?;

        self.redeem(&user, token, None).await?;

        info!(user = %user.uuid, "User logged out");
        Ok(())
    }

    /// End every session of a user. Returns how many were revoked.
    pub async fn logout_all(&self, user_uuid: &str) -> Result<u64, SessionError> {
        let user = self
            .db
            .users()
            .get_by_uuid(user_uuid)
            .await?
            .ok_or(SessionError::Revoked)?;

        let revoked = self.db.tokens().revoke_all(user.id).await?;

        info!(user = %user.uuid, revoked, "All sessions revoked");
        Ok(revoked)
    }

    fn issue_pair(&self, user_uuid: &str) -> Result<TokenPair, SessionError> {
        Ok(TokenPair {
            access_token: self.jwt.issue(user_uuid, TokenKind::Access)?,
            refresh_token: self.jwt.issue(user_uuid, TokenKind::Refresh)?,
        })
    }

    /// Signature, expiry and owner checks shared by refresh and logout.
    async fn authenticate_refresh<'t>(
        &self,
        refresh_token: Option<&'t str>,
    ) -> Result<(User, &'t str), SessionError> {
        let token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::MissingToken)?;

        let claims = self.jwt.verify(token, TokenKind::Refresh)?;

        let user = self
            .db
            .users()
            .get_by_uuid(&claims.sub)
            .await?
            .ok_or(SessionError::Revoked)?;

        Ok((user, token))
    }

    async fn redeem(
        &self,
        user: &User,
        token: &str,
        successor: Option<&str>,
    ) -> Result<(), SessionError> {
        match self.db.tokens().redeem(user.id, token, successor).await? {
            Redemption::Redeemed => Ok(()),
            Redemption::Reused { cleared } => {
                warn!(
                    user = %user.uuid,
                    cleared,
                    "Refresh token reuse detected, revoking all sessions"
                );
                Err(SessionError::Revoked)
            }
        }
    }
}
