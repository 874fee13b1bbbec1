//! Filtering and summary views over an ordered snapshot.

use serde::{Deserialize, Serialize};

use super::{Ticket, TicketStatus};

/// Filter applied to a snapshot before it is shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketQuery {
    /// Keep only tickets with this status.
    pub status: Option<TicketStatus>,
    /// Case-insensitive substring of title or description.
    pub search: Option<String>,
}

impl TicketQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        if let Some(status) = self.status {
            if ticket.status != status {
                return false;
            }
        }

        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                ticket.title.to_lowercase().contains(&term)
                    || ticket.description.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }

    /// Keep matching tickets, preserving snapshot order.
    pub fn apply<'a>(&self, tickets: impl IntoIterator<Item = &'a Ticket>) -> Vec<Ticket> {
        tickets
            .into_iter()
            .filter(|t| self.matches(t))
            .cloned()
            .collect()
    }
}

/// Ticket counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStats {
    pub total: usize,
    pub open: usize,
    pub in_progress: usize,
    pub closed: usize,
}

impl TicketStats {
    pub fn from_tickets<'a>(tickets: impl IntoIterator<Item = &'a Ticket>) -> Self {
        tickets
            .into_iter()
            .fold(Self::default(), |mut stats, ticket| {
                stats.total += 1;
                match ticket.status {
                    TicketStatus::Open => stats.open += 1,
                    TicketStatus::InProgress => stats.in_progress += 1,
                    TicketStatus::Closed => stats.closed += 1,
                }
                stats
            })
    }
}
