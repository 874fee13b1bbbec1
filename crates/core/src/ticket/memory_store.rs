//! In-memory ticket store.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{CollectionPath, StoreError, Ticket, TicketId, TicketStore};

type Collection = HashMap<TicketId, Ticket>;

/// Ticket store that keeps every collection in process memory.
#[derive(Debug, Default)]
pub struct MemoryTicketStore {
    collections: RwLock<HashMap<CollectionPath, Collection>>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TicketStore for MemoryTicketStore {
    fn insert(&self, path: &CollectionPath, ticket: &Ticket) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        let collection = collections.entry(path.clone()).or_default();
        if collection.contains_key(&ticket.id) {
            return Err(StoreError::Database(format!(
                "duplicate ticket id {} in {}",
                ticket.id, path
            )));
        }
        collection.insert(ticket.id.clone(), ticket.clone());
        Ok(())
    }

    fn get(&self, path: &CollectionPath, id: &TicketId) -> Result<Option<Ticket>, StoreError> {
        let collections = self.collections.read().map_err(|_| StoreError::Poisoned)?;
        Ok(collections.get(path).and_then(|c| c.get(id)).cloned())
    }

    fn replace(&self, path: &CollectionPath, ticket: &Ticket) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        match collections
            .get_mut(path)
            .and_then(|c| c.get_mut(&ticket.id))
        {
            Some(slot) => {
                *slot = ticket.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(
        &self,
        path: &CollectionPath,
        id: &TicketId,
    ) -> Result<Option<Ticket>, StoreError> {
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        Ok(collections.get_mut(path).and_then(|c| c.remove(id)))
    }

    fn list(&self, path: &CollectionPath) -> Result<Vec<Ticket>, StoreError> {
        let collections = self.collections.read().map_err(|_| StoreError::Poisoned)?;
        Ok(collections
            .get(path)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
