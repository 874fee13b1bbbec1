//! SQLite-backed ticket store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{CollectionPath, StoreError, Ticket, TicketId, TicketStore};

const SELECT_COLUMNS: &str =
    "SELECT id, title, description, priority, status, created_at, updated_at FROM tickets";

/// SQLite-backed ticket store.
pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteTicketStore {
    /// Create a new SQLite ticket store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite ticket store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                application_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                priority TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT,
                PRIMARY KEY (application_id, user_id, id)
            );
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<RawTicket> {
        Ok(RawTicket {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            priority: row.get(3)?,
            status: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

/// A row as stored, before enum and timestamp decoding.
struct RawTicket {
    id: String,
    title: String,
    description: String,
    priority: String,
    status: String,
    created_at: String,
    updated_at: Option<String>,
}

impl RawTicket {
    fn decode(self) -> Result<Ticket, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: self.id.clone(),
            reason,
        };

        let priority = self.priority.parse().map_err(|e| corrupt(format!("{e}")))?;
        let status = self.status.parse().map_err(|e| corrupt(format!("{e}")))?;
        let created_at = parse_timestamp(&self.created_at).map_err(&corrupt)?;
        let updated_at = self
            .updated_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(&corrupt)?;

        Ok(Ticket {
            id: TicketId::new(self.id),
            title: self.title,
            description: self.description,
            priority,
            status,
            created_at,
            updated_at,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp {value:?}: {e}"))
}

impl TicketStore for SqliteTicketStore {
    fn insert(&self, path: &CollectionPath, ticket: &Ticket) -> Result<(), StoreError> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO tickets (application_id, user_id, id, title, description, priority, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                path.application_id,
                path.user_id.as_str(),
                ticket.id.as_str(),
                ticket.title,
                ticket.description,
                ticket.priority.as_str(),
                ticket.status.as_str(),
                ticket.created_at.to_rfc3339(),
                ticket.updated_at.map(|t| t.to_rfc3339()),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get(&self, path: &CollectionPath, id: &TicketId) -> Result<Option<Ticket>, StoreError> {
        let conn = self.lock()?;

        let raw = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE application_id = ? AND user_id = ? AND id = ?"),
                params![path.application_id, path.user_id.as_str(), id.as_str()],
                Self::row_to_ticket,
            )
            .optional()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        raw.map(RawTicket::decode).transpose()
    }

    fn replace(&self, path: &CollectionPath, ticket: &Ticket) -> Result<bool, StoreError> {
        let conn = self.lock()?;

        let changed = conn
            .execute(
                "UPDATE tickets SET title = ?, description = ?, priority = ?, status = ?, created_at = ?, updated_at = ? WHERE application_id = ? AND user_id = ? AND id = ?",
                params![
                    ticket.title,
                    ticket.description,
                    ticket.priority.as_str(),
                    ticket.status.as_str(),
                    ticket.created_at.to_rfc3339(),
                    ticket.updated_at.map(|t| t.to_rfc3339()),
                    path.application_id,
                    path.user_id.as_str(),
                    ticket.id.as_str(),
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(changed > 0)
    }

    fn remove(
        &self,
        path: &CollectionPath,
        id: &TicketId,
    ) -> Result<Option<Ticket>, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        // Read then delete inside one transaction so the returned document is
        // exactly what was removed.
        let raw = tx
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE application_id = ? AND user_id = ? AND id = ?"),
                params![path.application_id, path.user_id.as_str(), id.as_str()],
                Self::row_to_ticket,
            )
            .optional()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        tx.execute(
            "DELETE FROM tickets WHERE application_id = ? AND user_id = ? AND id = ?",
            params![path.application_id, path.user_id.as_str(), id.as_str()],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        tx.commit()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        raw.decode().map(Some)
    }

    fn list(&self, path: &CollectionPath) -> Result<Vec<Ticket>, StoreError> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(&format!(
                "{SELECT_COLUMNS} WHERE application_id = ? AND user_id = ?"
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![path.application_id, path.user_id.as_str()],
                Self::row_to_ticket,
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut tickets = Vec::new();
        for row_result in rows {
            let raw = row_result.map_err(|e| StoreError::Database(e.to_string()))?;
            tickets.push(raw.decode()?);
        }

        Ok(tickets)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
