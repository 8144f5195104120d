//! Bearer-token authentication and ownership checks.
//!
//! Access tokens are verified purely by signature and expiry. The
//! authentication layer attaches the caller's identity to the request; the
//! ownership layer, which must run after it, compares that identity with the
//! owner of the entity named in the path.

mod errors;
mod extractors;
mod ownership;
mod state;
mod types;

pub use errors::AuthError;
pub use extractors::{Auth, authenticate_headers, bearer_token, require_auth};
pub use ownership::{EntityAccessor, require_owner};
pub use state::HasAuthBackend;
pub use types::AuthenticatedUser;
