//! Session verification interface.

use crate::model::Owner;

/// Identity errors. Local and never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing credentials")]
    Missing,

    #[error("Invalid or expired session")]
    Invalid,
}

/// Resolves a bearer token to the owner it belongs to.
///
/// Constructed once and passed to the service explicitly.
pub trait SessionVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Owner, AuthError>;
}
