//! Per-user dispatch loop.
//!
//! Every operation on one user's collection is a [`Command`] sent to that
//! user's loop. The loop applies commands one at a time in arrival order,
//! and after each successful mutation pushes a fresh ordered snapshot to every
//! listener before answering the caller.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use super::snapshot::{Snapshot, Subscription, SubscriptionHandle, SubscriptionId};
use super::EngineError;
use crate::config::EngineConfig;
use crate::metrics;
use crate::ticket::{
    order_snapshot, CollectionPath, NewTicket, Ticket, TicketId, TicketPatch, TicketStore,
};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

/// Work items processed by a dispatch loop.
pub(crate) enum Command {
    Create { ticket: NewTicket, reply: Reply<Ticket> },
    Update { id: TicketId, patch: TicketPatch, reply: Reply<Ticket> },
    Delete { id: TicketId, reply: Reply<()> },
    Get { id: TicketId, reply: Reply<Ticket> },
    Snapshot { reply: Reply<Snapshot> },
    Subscribe { reply: Reply<Subscription> },
    Unsubscribe { id: SubscriptionId, reply: Reply<()> },
}

/// Sending side of a user's dispatch loop.
///
/// Every clone shares one lease, so the engine can tell whether a request is
/// still holding the loop before retiring it.
#[derive(Debug, Clone)]
pub(crate) struct DispatchHandle {
    tx: mpsc::Sender<Command>,
    lease: Arc<()>,
    listeners: Arc<AtomicUsize>,
}

impl DispatchHandle {
    /// Queue a command and wait for the loop's answer.
    ///
    /// Waits for a queue slot when the loop is busy.
    pub(crate) async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| loop_stopped())?;
        rx.await.map_err(|_| loop_stopped())?
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// True while any clone besides this one exists.
    pub(crate) fn in_use(&self) -> bool {
        Arc::strong_count(&self.lease) > 1
    }

    /// Listeners the loop held after its last subscribe, unsubscribe or prune.
    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.load(Ordering::Acquire)
    }
}

fn loop_stopped() -> EngineError {
    EngineError::BackendUnavailable("dispatch loop stopped".to_string())
}

/// A registered listener, as seen from the loop.
struct Listener {
    handle: SubscriptionHandle,
    tx: broadcast::Sender<Arc<Snapshot>>,
}

impl Listener {
    fn is_gone(&self) -> bool {
        self.handle.is_cancelled() || self.tx.receiver_count() == 0
    }
}

/// Owner of one user's collection access and listener list.
pub(crate) struct DispatchLoop {
    path: CollectionPath,
    store: Arc<dyn TicketStore>,
    rx: mpsc::Receiver<Command>,
    listeners: Vec<Listener>,
    listener_count: Arc<AtomicUsize>,
    snapshot_buffer: usize,
    prune_interval: Option<Duration>,
    version: u64,
    subscription_ids: Arc<AtomicU64>,
}

/// Start a dispatch loop for `path` and return its handle and task.
///
/// `subscription_ids` is shared by every loop of an engine so that a handle
/// from a stopped loop never names a listener of its replacement.
pub(crate) fn spawn_dispatch_loop(
    path: CollectionPath,
    store: Arc<dyn TicketStore>,
    config: &EngineConfig,
    subscription_ids: Arc<AtomicU64>,
) -> (DispatchHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.command_buffer);
    let listener_count = Arc::new(AtomicUsize::new(0));
    let dispatch_loop = DispatchLoop {
        path,
        store,
        rx,
        listeners: Vec::new(),
        listener_count: Arc::clone(&listener_count),
        snapshot_buffer: config.snapshot_buffer,
        prune_interval: config.idle_timeout(),
        version: 0,
        subscription_ids,
    };
    let task = tokio::spawn(dispatch_loop.run());
    let handle = DispatchHandle {
        tx,
        lease: Arc::new(()),
        listeners: listener_count,
    };
    (handle, task)
}

impl DispatchLoop {
    /// Process commands until every handle is dropped.
    pub(crate) async fn run(mut self) {
        tracing::info!(collection = %self.path, "Dispatch loop started");
        metrics::DISPATCH_LOOPS_ACTIVE.inc();

        loop {
            let next = match self.prune_interval {
                Some(interval) => match tokio::time::timeout(interval, self.rx.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        // Quiet period: forget dropped streams so the loop can be retired
                        self.prune();
                        continue;
                    }
                },
                None => self.rx.recv().await,
            };
            let Some(command) = next else { break };
            self.handle(command);
        }

        metrics::SUBSCRIPTIONS_ACTIVE.sub(self.listeners.len() as i64);
        metrics::DISPATCH_LOOPS_ACTIVE.dec();
        tracing::info!(
            collection = %self.path,
            mutations = self.version,
            "Dispatch loop stopped"
        );
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Create { ticket, reply } => {
                let result = self.create(ticket);
                self.complete_mutation("create", result, reply);
            }
            Command::Update { id, patch, reply } => {
                let result = self.update(id, patch);
                self.complete_mutation("update", result, reply);
            }
            Command::Delete { id, reply } => {
                let result = self.delete(id);
                self.complete_mutation("delete", result, reply);
            }
            Command::Get { id, reply } => {
                let _ = reply.send(self.get(id));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Subscribe { reply } => {
                let result = self.subscribe();
                record("subscribe", &result);
                let _ = reply.send(result);
            }
            Command::Unsubscribe { id, reply } => {
                self.unsubscribe(id);
                let _ = reply.send(Ok(()));
            }
        }
    }

    /// Dispatch on success, then answer the caller.
    fn complete_mutation<T>(
        &mut self,
        operation: &'static str,
        result: Result<T, EngineError>,
        reply: Reply<T>,
    ) {
        record(operation, &result);
        match &result {
            Ok(_) => {
                self.version += 1;
                self.dispatch();
            }
            Err(EngineError::BackendUnavailable(reason)) => {
                tracing::error!(collection = %self.path, operation, %reason, "Write failed");
            }
            Err(e) => {
                tracing::debug!(collection = %self.path, operation, error = %e, "Write rejected");
            }
        }
        // The caller may have given up waiting; the write still stands.
        let _ = reply.send(result);
    }

    fn create(&self, new_ticket: NewTicket) -> Result<Ticket, EngineError> {
        new_ticket.validate().map_err(EngineError::missing_field)?;
        let ticket = new_ticket.into_ticket(TicketId::generate(), Utc::now());
        self.store.insert(&self.path, &ticket)?;
        tracing::debug!(collection = %self.path, ticket_id = %ticket.id, "Ticket created");
        Ok(ticket)
    }

    fn update(&self, id: TicketId, patch: TicketPatch) -> Result<Ticket, EngineError> {
        patch.validate().map_err(EngineError::missing_field)?;
        let existing = self
            .store
            .get(&self.path, &id)?
            .ok_or_else(|| EngineError::NotFound(id.clone()))?;
        let updated = patch.apply(&existing, Utc::now());
        if !self.store.replace(&self.path, &updated)? {
            return Err(EngineError::NotFound(id));
        }
        tracing::debug!(collection = %self.path, ticket_id = %id, "Ticket updated");
        Ok(updated)
    }

    fn delete(&self, id: TicketId) -> Result<(), EngineError> {
        match self.store.remove(&self.path, &id)? {
            Some(_) => {
                tracing::debug!(collection = %self.path, ticket_id = %id, "Ticket deleted");
                Ok(())
            }
            None => Err(EngineError::NotFound(id)),
        }
    }

    fn get(&self, id: TicketId) -> Result<Ticket, EngineError> {
        self.store
            .get(&self.path, &id)?
            .ok_or(EngineError::NotFound(id))
    }

    fn snapshot(&self) -> Result<Snapshot, EngineError> {
        let tickets = order_snapshot(self.store.list(&self.path)?);
        Ok(Snapshot {
            user_id: self.path.user_id.clone(),
            version: self.version,
            tickets,
        })
    }

    fn subscribe(&mut self) -> Result<Subscription, EngineError> {
        let snapshot = Arc::new(self.snapshot()?);

        let id = self.subscription_ids.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = SubscriptionHandle::new(SubscriptionId(id), self.path.user_id.clone());
        let (tx, rx) = broadcast::channel(self.snapshot_buffer);
        // `rx` is alive, so the initial snapshot is always buffered.
        let _ = tx.send(snapshot);
        metrics::SNAPSHOTS_DELIVERED.inc();

        self.listeners.push(Listener {
            handle: handle.clone(),
            tx,
        });
        self.publish_listener_count();
        metrics::SUBSCRIPTIONS_ACTIVE.inc();
        tracing::debug!(
            collection = %self.path,
            subscription = %handle.id(),
            listeners = self.listeners.len(),
            "Listener registered"
        );

        Ok(Subscription::new(handle, rx))
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        let before = self.listeners.len();
        self.listeners.retain(|listener| listener.handle.id() != id);
        let removed = before - self.listeners.len();
        self.publish_listener_count();
        if removed > 0 {
            metrics::SUBSCRIPTIONS_ACTIVE.sub(removed as i64);
            tracing::debug!(collection = %self.path, subscription = %id, "Listener removed");
        }
    }

    /// Push the current ordered snapshot to every live listener.
    ///
    /// Sends never wait: a full listener buffer overwrites its oldest entry.
    fn dispatch(&mut self) {
        self.prune();
        if self.listeners.is_empty() {
            return;
        }

        let snapshot = match self.snapshot() {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                // The write itself succeeded; the next dispatch will catch up.
                tracing::error!(collection = %self.path, error = %e, "Snapshot recompute failed");
                metrics::SNAPSHOT_FAILURES.inc();
                return;
            }
        };

        for listener in &self.listeners {
            let _ = listener.tx.send(Arc::clone(&snapshot));
        }
        metrics::SNAPSHOTS_DELIVERED.inc_by(self.listeners.len() as u64);
        tracing::debug!(
            collection = %self.path,
            version = snapshot.version,
            tickets = snapshot.len(),
            listeners = self.listeners.len(),
            "Snapshot dispatched"
        );
    }

    /// Drop listeners that were cancelled or whose receiver is gone.
    fn prune(&mut self) {
        let before = self.listeners.len();
        self.listeners.retain(|listener| !listener.is_gone());
        let pruned = before - self.listeners.len();
        if pruned > 0 {
            self.publish_listener_count();
            metrics::SUBSCRIPTIONS_ACTIVE.sub(pruned as i64);
            tracing::debug!(collection = %self.path, pruned, "Pruned departed listeners");
        }
    }

    fn publish_listener_count(&self) {
        self.listener_count
            .store(self.listeners.len(), Ordering::Release);
    }
}

fn record<T>(operation: &str, result: &Result<T, EngineError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::ENGINE_OPERATIONS
        .with_label_values(&[operation, outcome])
        .inc();
}
