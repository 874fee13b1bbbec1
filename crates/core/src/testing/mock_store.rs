//! Mock ticket store for testing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::ticket::{
    CollectionPath, MemoryTicketStore, StoreError, Ticket, TicketId, TicketStore,
};

/// In-memory store whose reads and writes can be made to fail on demand.
///
/// ```rust,ignore
/// let store = Arc::new(MockTicketStore::new());
/// let engine = TicketEngine::new(store.clone(), EngineConfig::default());
///
/// store.fail_writes(true);
/// assert!(matches!(
///     engine.create(&user, ticket).await,
///     Err(EngineError::BackendUnavailable(_))
/// ));
/// ```
#[derive(Debug, Default)]
pub struct MockTicketStore {
    inner: MemoryTicketStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MockTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `get` and `list` fail until turned off again.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make `insert`, `replace` and `remove` fail until turned off again.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Database("simulated read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("simulated write failure".to_string()));
        }
        Ok(())
    }

    fn wrote<T>(&self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        if result.is_ok() {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}

impl TicketStore for MockTicketStore {
    fn insert(&self, path: &CollectionPath, ticket: &Ticket) -> Result<(), StoreError> {
        self.check_write()?;
        self.wrote(self.inner.insert(path, ticket))
    }

    fn get(&self, path: &CollectionPath, id: &TicketId) -> Result<Option<Ticket>, StoreError> {
        self.check_read()?;
        self.inner.get(path, id)
    }

    fn replace(&self, path: &CollectionPath, ticket: &Ticket) -> Result<bool, StoreError> {
        self.check_write()?;
        self.wrote(self.inner.replace(path, ticket))
    }

    fn remove(&self, path: &CollectionPath, id: &TicketId) -> Result<Option<Ticket>, StoreError> {
        self.check_write()?;
        self.wrote(self.inner.remove(path, id))
    }

    fn list(&self, path: &CollectionPath) -> Result<Vec<Ticket>, StoreError> {
        self.check_read()?;
        self.inner.list(path)
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}
