//! Ticket engine: per-user dispatch loops, snapshots and subscriptions.
//!
//! Each user's collection is served by a single dispatch loop that applies
//! writes in submission order and pushes a complete, ordered [`Snapshot`] to
//! every listener after each successful mutation.

mod dispatch;
#[allow(clippy::module_inception)]
mod engine;
mod error;
mod session;
mod snapshot;

pub use engine::TicketEngine;
pub use error::EngineError;
pub use session::TicketSession;
pub use snapshot::{Snapshot, Subscription, SubscriptionHandle, SubscriptionId};
