//! Identity resolution for collection access.
//!
//! The engine never authenticates anyone itself. It asks an
//! [`IdentityResolver`] which user is acting, and refuses collection access
//! while the answer is still pending.

use std::sync::Arc;

use tokio::sync::watch;

use super::Identity;
use crate::ticket::UserId;

/// Outcome of asking a resolver who the current user is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityState {
    /// No identity yet (sign-in in progress, or signed out).
    Pending,
    Resolved(UserId),
}

impl IdentityState {
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            IdentityState::Pending => None,
            IdentityState::Resolved(user_id) => Some(user_id),
        }
    }
}

/// Source of the acting user's identity.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self) -> IdentityState;
}

/// An authenticated request identity is always resolved.
impl IdentityResolver for Identity {
    fn resolve(&self) -> IdentityState {
        IdentityState::Resolved(self.user_id.clone())
    }
}

impl IdentityResolver for UserId {
    fn resolve(&self) -> IdentityState {
        IdentityState::Resolved(self.clone())
    }
}

/// Session-scoped identity that starts pending and is set on sign-in.
///
/// Cloning shares the underlying session, so a view can hold one clone while
/// the sign-in flow holds another.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    tx: Arc<watch::Sender<Option<UserId>>>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Mark the session as belonging to `user_id`.
    pub fn sign_in(&self, user_id: UserId) {
        tracing::debug!(user_id = %user_id, "Session identity resolved");
        self.tx.send_replace(Some(user_id));
    }

    /// Drop back to pending.
    pub fn sign_out(&self) {
        tracing::debug!("Session identity cleared");
        self.tx.send_replace(None);
    }

    /// Wait until an identity is available.
    pub async fn resolved(&self) -> UserId {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(user_id) = rx.borrow_and_update().clone() {
                return user_id;
            }
            // `self` owns the sender, so the channel stays open while we wait.
            let _ = rx.changed().await;
        }
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityResolver for SessionIdentity {
    fn resolve(&self) -> IdentityState {
        match self.tx.borrow().as_ref() {
            Some(user_id) => IdentityState::Resolved(user_id.clone()),
            None => IdentityState::Pending,
        }
    }
}
