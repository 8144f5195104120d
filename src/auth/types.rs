//! Authentication user types.

use crate::jwt::Claims;

/// Identity attached to a request once its access token has been verified.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Claims from the access token
    pub claims: Claims,
}

impl AuthenticatedUser {
    /// UUID of the authenticated user.
    pub fn uuid(&self) -> &str {
        &self.claims.sub
    }
}
