//! Identity, sessions and route access policy.
//! Keep the public surface thin and split implementation across sub-modules.

mod role;
mod session;
mod provider;
mod policy;

use thiserror::Error;

pub use role::{AccountStatus, Role};
pub use session::{Session, SessionIssuer, SessionToken, TOKEN_ISSUER};
pub use provider::{authenticate, ensure_bootstrap_admin, CredentialStore, LoginRequest, LoginResponse};
pub use policy::{builtin_zones, normalize_path, split_segments, Access, Decision, PathError, PolicyError, RoutePolicy, ZoneRule};

/// Authentication and session failures. All are terminal for the request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("account is inactive")]
    AccountInactive,
    #[error("account role is not recognised")]
    UnknownRole,
    #[error("session token is malformed")]
    MalformedSession,
    #[error("session has expired")]
    SessionExpired,
    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("could not sign session: {0}")]
    TokenSigning(String),
}
