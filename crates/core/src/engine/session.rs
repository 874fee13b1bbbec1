use std::sync::Arc;

use super::snapshot::{Snapshot, Subscription, SubscriptionHandle};
use super::{EngineError, TicketEngine};
use crate::auth::IdentityResolver;
use crate::ticket::{NewTicket, Ticket, TicketId, TicketPatch, UserId};

/// The engine as seen by one client session.
///
/// Every call resolves the acting user first and fails with
/// `NotAuthenticated` while the identity is still pending.
pub struct TicketSession<R> {
    engine: TicketEngine,
    identity: R,
}

impl<R: IdentityResolver> TicketSession<R> {
    pub fn new(engine: TicketEngine, identity: R) -> Self {
        Self { engine, identity }
    }

    pub fn identity(&self) -> &R {
        &self.identity
    }

    /// The resolved user, or `NotAuthenticated`.
    pub fn user_id(&self) -> Result<UserId, EngineError> {
        self.identity
            .resolve()
            .user_id()
            .cloned()
            .ok_or(EngineError::NotAuthenticated)
    }

    pub async fn create(&self, ticket: NewTicket) -> Result<Ticket, EngineError> {
        let user_id = self.user_id()?;
        self.engine.create(&user_id, ticket).await
    }

    pub async fn update(&self, id: &TicketId, patch: TicketPatch) -> Result<Ticket, EngineError> {
        let user_id = self.user_id()?;
        self.engine.update(&user_id, id, patch).await
    }

    pub async fn delete(&self, id: &TicketId) -> Result<(), EngineError> {
        let user_id = self.user_id()?;
        self.engine.delete(&user_id, id).await
    }

    pub async fn get(&self, id: &TicketId) -> Result<Ticket, EngineError> {
        let user_id = self.user_id()?;
        self.engine.get(&user_id, id).await
    }

    pub async fn snapshot(&self) -> Result<Snapshot, EngineError> {
        let user_id = self.user_id()?;
        self.engine.snapshot(&user_id).await
    }

    pub async fn subscribe(&self) -> Result<Subscription, EngineError> {
        let user_id = self.user_id()?;
        self.engine.subscribe(&user_id).await
    }

    pub async fn watch<F>(&self, on_snapshot: F) -> Result<SubscriptionHandle, EngineError>
    where
        F: FnMut(Arc<Snapshot>) + Send + 'static,
    {
        let user_id = self.user_id()?;
        self.engine.watch(&user_id, on_snapshot).await
    }

    /// Handles carry their user, so this works even after sign-out.
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) {
        self.engine.unsubscribe(handle).await
    }
}
