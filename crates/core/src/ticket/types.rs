//! Ticket data model.
//!
//! Tickets live in per-user collections addressed by a [`CollectionPath`].
//! The wire shape uses camelCase field names and human-readable enum values
//! (`"In Progress"`), matching what the dashboard renders.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identity of the user owning a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifier of a ticket, unique within one collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Allocate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TicketId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Address of one user's ticket collection within an application.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    pub application_id: String,
    pub user_id: UserId,
}

impl CollectionPath {
    pub fn new(application_id: impl Into<String>, user_id: UserId) -> Self {
        Self {
            application_id: application_id.into(),
            user_id,
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "apps/{}/users/{}/tickets",
            self.application_id, self.user_id
        )
    }
}

/// Error returned when a priority or status string is not a known value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Ticket urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Sort weight: higher means more urgent.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 2,
            Priority::Medium => 1,
            Priority::Low => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(ParseEnumError {
                kind: "priority",
                value: s.to_string(),
            }),
        }
    }
}

/// Ticket lifecycle status.
///
/// Any status may be set from any other; there is no enforced transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TicketStatus {
    #[default]
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::Closed => "Closed",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, TicketStatus::Open)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = ParseEnumError;

    /// Accepts the display form (`"In Progress"`) as well as the snake form
    /// (`"in_progress"`) used in query strings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(TicketStatus::Open),
            "in progress" | "in_progress" => Ok(TicketStatus::InProgress),
            "closed" => Ok(TicketStatus::Closed),
            _ => Err(ParseEnumError {
                kind: "status",
                value: s.to_string(),
            }),
        }
    }
}

/// A support ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    /// Unset until the first successful update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields supplied when creating a ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<TicketStatus>,
}

impl NewTicket {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            priority: None,
            status: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Check required fields. Returns the name of the first missing field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.title.trim().is_empty() {
            return Err("title");
        }
        if self.description.trim().is_empty() {
            return Err("description");
        }
        Ok(())
    }

    /// Build the stored document, applying defaults.
    pub fn into_ticket(self, id: TicketId, created_at: DateTime<Utc>) -> Ticket {
        Ticket {
            id,
            title: self.title,
            description: self.description,
            priority: self.priority.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            created_at,
            updated_at: None,
        }
    }
}

/// Partial update. Only fields that are `Some` are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<TicketStatus>,
}

impl TicketPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Supplied text fields must still be non-empty.
    pub fn validate(&self) -> Result<(), &'static str> {
        if matches!(&self.title, Some(t) if t.trim().is_empty()) {
            return Err("title");
        }
        if matches!(&self.description, Some(d) if d.trim().is_empty()) {
            return Err("description");
        }
        Ok(())
    }

    /// Merge onto an existing ticket. `id` and `created_at` are never touched.
    pub fn apply(self, ticket: &Ticket, updated_at: DateTime<Utc>) -> Ticket {
        Ticket {
            id: ticket.id.clone(),
            title: self.title.unwrap_or_else(|| ticket.title.clone()),
            description: self
                .description
                .unwrap_or_else(|| ticket.description.clone()),
            priority: self.priority.unwrap_or(ticket.priority),
            status: self.status.unwrap_or(ticket.status),
            created_at: ticket.created_at,
            updated_at: Some(updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ticket() -> Ticket {
        NewTicket::new("Build fails", "CI red")
            .with_priority(Priority::High)
            .into_ticket(TicketId::new("t-1"), Utc::now())
    }

    #[test]
    fn test_new_ticket_defaults() {
        let ticket = NewTicket::new("title", "desc").into_ticket(TicketId::generate(), Utc::now());
        assert_eq!(ticket.priority, Priority::Medium);
        assert_eq!(ticket.status, TicketStatus::Open);
        assert!(ticket.updated_at.is_none());
    }

    #[test]
    fn test_new_ticket_validation_trims() {
        assert_eq!(NewTicket::new("   ", "desc").validate(), Err("title"));
        assert_eq!(NewTicket::new("title", "\n\t").validate(), Err("description"));
        assert!(NewTicket::new("title", "desc").validate().is_ok());
    }

    #[test]
    fn test_patch_rejects_blank_supplied_fields() {
        assert_eq!(TicketPatch::new().title(" ").validate(), Err("title"));
        assert_eq!(TicketPatch::new().description("").validate(), Err("description"));
        assert!(TicketPatch::new().validate().is_ok());
    }

    #[test]
    fn test_patch_merges_only_supplied_fields() {
        let ticket = sample_ticket();
        let now = Utc::now();

        let updated = TicketPatch::new()
            .status(TicketStatus::Closed)
            .apply(&ticket, now);

        assert_eq!(updated.status, TicketStatus::Closed);
        assert_eq!(updated.updated_at, Some(now));
        assert_eq!(updated.id, ticket.id);
        assert_eq!(updated.title, ticket.title);
        assert_eq!(updated.description, ticket.description);
        assert_eq!(updated.priority, ticket.priority);
        assert_eq!(updated.created_at, ticket.created_at);
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&TicketStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");

        let status: TicketStatus = serde_json::from_str("\"Closed\"").unwrap();
        assert_eq!(status, TicketStatus::Closed);

        assert!(serde_json::from_str::<TicketStatus>("\"Resolved\"").is_err());
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("In Progress".parse::<TicketStatus>(), Ok(TicketStatus::InProgress));
        assert_eq!("in_progress".parse::<TicketStatus>(), Ok(TicketStatus::InProgress));
        assert_eq!("open".parse::<TicketStatus>(), Ok(TicketStatus::Open));

        let err = "done".parse::<TicketStatus>().unwrap_err();
        assert_eq!(err.kind, "status");
    }

    #[test]
    fn test_priority_from_str() {
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert!("urgent".parse::<Priority>().is_err());
        assert!(Priority::High.rank() > Priority::Medium.rank());
        assert!(Priority::Medium.rank() > Priority::Low.rank());
    }

    #[test]
    fn test_ticket_wire_shape() {
        let ticket = sample_ticket();
        let value = serde_json::to_value(&ticket).unwrap();

        assert_eq!(value["id"], "t-1");
        assert_eq!(value["priority"], "High");
        assert_eq!(value["status"], "Open");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("updatedAt").is_none());
    }

    #[test]
    fn test_collection_path_display() {
        let path = CollectionPath::new("ticketdesk", UserId::new("u-42"));
        assert_eq!(path.to_string(), "apps/ticketdesk/users/u-42/tickets");
    }
}
