//! Testing utilities shared by unit and integration tests.

mod mock_store;

pub use mock_store::MockTicketStore;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::ticket::{Priority, Ticket, TicketId, TicketStatus};

    /// A fixed instant, so ordering by `created_at` is predictable.
    pub fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// A ticket created `minutes` after [`base_time`].
    pub fn ticket(
        id: &str,
        priority: Priority,
        status: TicketStatus,
        minutes: i64,
    ) -> Ticket {
        Ticket {
            id: TicketId::new(id),
            title: format!("Ticket {id}"),
            description: format!("Description of {id}"),
            priority,
            status,
            created_at: base_time() + Duration::minutes(minutes),
            updated_at: None,
        }
    }
}
