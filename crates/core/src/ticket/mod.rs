//! Ticket documents, storage backends, and snapshot ordering.

mod memory_store;
mod ordering;
mod query;
mod sqlite_store;
mod store;
mod types;

pub use memory_store::MemoryTicketStore;
pub use ordering::{compare_tickets, order_snapshot};
pub use query::{TicketQuery, TicketStats};
pub use sqlite_store::SqliteTicketStore;
pub use store::{create_ticket_store, StoreError, TicketStore};
pub use types::{
    CollectionPath, NewTicket, ParseEnumError, Priority, Ticket, TicketId, TicketPatch,
    TicketStatus, UserId,
};
