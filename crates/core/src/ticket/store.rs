//! Ticket storage trait and types.

use thiserror::Error;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::ticket::{CollectionPath, MemoryTicketStore, SqliteTicketStore, Ticket, TicketId};

/// Error type for storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying database failed.
    #[error("Database error: {0}")]
    Database(String),
    /// A stored document could not be decoded.
    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
    /// A lock guarding the backend was poisoned by a panicking writer.
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Storage backend for ticket collections.
///
/// Backends are plain keyed document stores. They perform no validation and
/// no merging; the engine serializes every call for a given collection, so a
/// read followed by a write on the same path is never interleaved with another
/// writer of that path.
pub trait TicketStore: Send + Sync {
    /// Insert a new document. The id must not already exist in the collection.
    fn insert(&self, path: &CollectionPath, ticket: &Ticket) -> Result<(), StoreError>;

    /// Fetch one document.
    fn get(&self, path: &CollectionPath, id: &TicketId) -> Result<Option<Ticket>, StoreError>;

    /// Overwrite an existing document. Returns `false` if it does not exist.
    fn replace(&self, path: &CollectionPath, ticket: &Ticket) -> Result<bool, StoreError>;

    /// Remove a document, returning it if it existed.
    fn remove(&self, path: &CollectionPath, id: &TicketId)
        -> Result<Option<Ticket>, StoreError>;

    /// All documents in the collection, in no particular order.
    fn list(&self, path: &CollectionPath) -> Result<Vec<Ticket>, StoreError>;

    /// Name of this backend, for logs and the config endpoint.
    fn backend_name(&self) -> &'static str;
}

/// Build the configured storage backend.
pub fn create_ticket_store(config: &DatabaseConfig) -> Result<Box<dyn TicketStore>, StoreError> {
    match config.backend {
        DatabaseBackend::Memory => Ok(Box::new(MemoryTicketStore::new())),
        DatabaseBackend::Sqlite => Ok(Box::new(SqliteTicketStore::new(&config.path)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_memory_store() {
        let config = DatabaseConfig {
            backend: DatabaseBackend::Memory,
            ..Default::default()
        };
        let store = create_ticket_store(&config).unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[test]
    fn test_create_sqlite_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            backend: DatabaseBackend::Sqlite,
            path: temp_dir.path().join("tickets.db"),
        };
        let store = create_ticket_store(&config).unwrap();
        assert_eq!(store.backend_name(), "sqlite");
        assert!(config.path.exists());
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Corrupt {
            id: "t-1".to_string(),
            reason: "bad priority".to_string(),
        };
        assert_eq!(err.to_string(), "Corrupt record t-1: bad priority");
    }
}
