use async_trait::async_trait;
use thiserror::Error;

use super::types::{AuthRequest, Identity};

/// Why a request could not be tied to a ticket collection.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No session token in the `Authorization` header or `token` query.
    #[error("No session token presented")]
    MissingToken,

    /// A token was presented but maps to no configured user.
    #[error("Session rejected: {0}")]
    UnknownSession(String),

    /// The `[auth]` section cannot produce an authenticator.
    #[error("Auth misconfigured: {0}")]
    Misconfigured(String),
}

/// Maps an incoming request to the user whose collection it acts on.
///
/// The returned identity's `user_id` picks the collection; two requests that
/// resolve to the same user read and write the same tickets.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    /// Reported by `/api/v1/config` and stamped on each identity.
    fn method_name(&self) -> &'static str;
}
