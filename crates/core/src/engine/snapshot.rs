use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::metrics;
use crate::ticket::{Ticket, UserId};

/// A complete, ordered view of one user's collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub user_id: UserId,
    /// Mutations applied by the user's dispatch loop when this was taken.
    pub version: u64,
    pub tickets: Vec<Ticket>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

/// Identifier of a listener, unique across every loop of one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Token identifying a registered listener, consumed by `unsubscribe`.
///
/// Clones share the cancelled flag, so cancelling through any of them
/// cancels the listener exactly once.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    user_id: UserId,
    cancelled: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    pub(crate) fn new(id: SubscriptionId, user_id: UserId) -> Self {
        Self {
            id,
            user_id,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Mark as cancelled. Returns true only for the call that flipped it.
    pub(crate) fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }
}

/// Receiving side of a listener registration.
///
/// Holds at most `snapshot_buffer` undelivered snapshots; if the consumer
/// falls further behind, the oldest are discarded and only newer ones remain.
pub struct Subscription {
    handle: SubscriptionHandle,
    rx: broadcast::Receiver<Arc<Snapshot>>,
}

impl Subscription {
    pub(crate) fn new(handle: SubscriptionHandle, rx: broadcast::Receiver<Arc<Snapshot>>) -> Self {
        Self { handle, rx }
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Wait for the next snapshot.
    ///
    /// Returns `None` once the subscription is cancelled or the engine has
    /// shut down.
    pub async fn recv(&mut self) -> Option<Arc<Snapshot>> {
        loop {
            if self.handle.is_cancelled() {
                return None;
            }
            match self.rx.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(RecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Drain everything buffered and return the most recent snapshot, if any.
    pub fn latest(&mut self) -> Option<Arc<Snapshot>> {
        if self.handle.is_cancelled() {
            return None;
        }
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(snapshot) => latest = Some(snapshot),
                Err(TryRecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return latest,
            }
        }
    }

    fn record_lag(&self, skipped: u64) {
        tracing::warn!(
            user_id = %self.handle.user_id,
            subscription = %self.handle.id,
            skipped,
            "Listener fell behind, oldest snapshots dropped"
        );
        metrics::SNAPSHOTS_LAGGED.inc_by(skipped);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
