//! Snapshot ordering policy.
//!
//! Every snapshot handed to a listener is sorted here, fresh, from the
//! unordered document set:
//! 1. Open tickets before any other status
//! 2. Priority descending (High, Medium, Low)
//! 3. Newest `created_at` first
//! 4. Ticket id ascending, so equal timestamps still sort deterministically

use std::cmp::Ordering;

use super::Ticket;

/// Total order used for snapshots.
pub fn compare_tickets(a: &Ticket, b: &Ticket) -> Ordering {
    b.status
        .is_open()
        .cmp(&a.status.is_open())
        .then_with(|| b.priority.rank().cmp(&a.priority.rank()))
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort a document set into snapshot order.
pub fn order_snapshot(mut tickets: Vec<Ticket>) -> Vec<Ticket> {
    tickets.sort_by(compare_tickets);
    tickets
}
