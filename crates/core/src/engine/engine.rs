use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::dispatch::{spawn_dispatch_loop, Command, DispatchHandle};
use super::snapshot::{Snapshot, Subscription, SubscriptionHandle};
use super::EngineError;
use crate::config::EngineConfig;
use crate::ticket::{CollectionPath, NewTicket, Ticket, TicketId, TicketPatch, TicketStore, UserId};

/// One user's running dispatch loop.
struct Partition {
    handle: DispatchHandle,
    task: JoinHandle<()>,
    last_used: Instant,
}

impl Partition {
    /// No request in flight, no listener, and untouched for `idle`.
    fn is_idle(&self, idle: Duration) -> bool {
        !self.handle.in_use()
            && self.handle.listener_count() == 0
            && self.last_used.elapsed() >= idle
    }
}

struct EngineInner {
    store: Arc<dyn TicketStore>,
    config: EngineConfig,
    partitions: Mutex<HashMap<UserId, Partition>>,
    subscription_ids: Arc<AtomicU64>,
    shut_down: AtomicBool,
}

/// Real-time per-user ticket collections.
///
/// Cloning is cheap and every clone talks to the same dispatch loops.
/// Loops are started on first use of a user's collection. A loop with no
/// listeners that sees no requests for `idle_timeout_secs` is retired and
/// started again on the next request; the rest run until
/// [`TicketEngine::shutdown`].
#[derive(Clone)]
pub struct TicketEngine {
    inner: Arc<EngineInner>,
}

impl TicketEngine {
    pub fn new(store: Arc<dyn TicketStore>, config: EngineConfig) -> Self {
        tracing::info!(
            backend = store.backend_name(),
            application_id = %config.application_id,
            "Ticket engine created"
        );
        Self {
            inner: Arc::new(EngineInner {
                store,
                config,
                partitions: Mutex::new(HashMap::new()),
                subscription_ids: Arc::new(AtomicU64::new(0)),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Create a ticket. Listeners see it before this returns.
    pub async fn create(&self, user_id: &UserId, ticket: NewTicket) -> Result<Ticket, EngineError> {
        self.dispatcher(user_id)
            .await?
            .request(|reply| Command::Create { ticket, reply })
            .await
    }

    /// Merge `patch` onto an existing ticket.
    pub async fn update(
        &self,
        user_id: &UserId,
        id: &TicketId,
        patch: TicketPatch,
    ) -> Result<Ticket, EngineError> {
        let id = id.clone();
        self.dispatcher(user_id)
            .await?
            .request(|reply| Command::Update { id, patch, reply })
            .await
    }

    pub async fn delete(&self, user_id: &UserId, id: &TicketId) -> Result<(), EngineError> {
        let id = id.clone();
        self.dispatcher(user_id)
            .await?
            .request(|reply| Command::Delete { id, reply })
            .await
    }

    pub async fn get(&self, user_id: &UserId, id: &TicketId) -> Result<Ticket, EngineError> {
        let id = id.clone();
        self.dispatcher(user_id)
            .await?
            .request(|reply| Command::Get { id, reply })
            .await
    }

    /// Current ordered snapshot, read through the user's loop.
    pub async fn snapshot(&self, user_id: &UserId) -> Result<Snapshot, EngineError> {
        self.dispatcher(user_id)
            .await?
            .request(|reply| Command::Snapshot { reply })
            .await
    }

    /// Current tickets in snapshot order.
    pub async fn list(&self, user_id: &UserId) -> Result<Vec<Ticket>, EngineError> {
        Ok(self.snapshot(user_id).await?.tickets)
    }

    /// Register a listener. The returned subscription already holds the
    /// snapshot of the collection as of registration.
    pub async fn subscribe(&self, user_id: &UserId) -> Result<Subscription, EngineError> {
        self.dispatcher(user_id)
            .await?
            .request(|reply| Command::Subscribe { reply })
            .await
    }

    /// Register a callback listener.
    ///
    /// `on_snapshot` is called with the current snapshot before this returns,
    /// then from a background task after every mutation until the returned
    /// handle is passed to [`TicketEngine::unsubscribe`].
    pub async fn watch<F>(
        &self,
        user_id: &UserId,
        mut on_snapshot: F,
    ) -> Result<SubscriptionHandle, EngineError>
    where
        F: FnMut(Arc<Snapshot>) + Send + 'static,
    {
        let mut subscription = self.subscribe(user_id).await?;
        let handle = subscription.handle();

        if let Some(initial) = subscription.latest() {
            on_snapshot(initial);
        }

        let forward = handle.clone();
        tokio::spawn(async move {
            while let Some(snapshot) = subscription.recv().await {
                if forward.is_cancelled() {
                    break;
                }
                on_snapshot(snapshot);
            }
            tracing::debug!(subscription = %forward.id(), "Watch forwarder finished");
        });

        Ok(handle)
    }

    /// Remove a listener. Calling it again with the same handle, or a clone
    /// of it, does nothing.
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) {
        if !handle.cancel() {
            return;
        }

        let dispatcher = {
            let partitions = self.inner.partitions.lock().await;
            partitions
                .get(handle.user_id())
                .map(|partition| partition.handle.clone())
        };
        let Some(dispatcher) = dispatcher else {
            return;
        };

        let id = handle.id();
        if let Err(e) = dispatcher
            .request(|reply| Command::Unsubscribe { id, reply })
            .await
        {
            // A stopped loop has no listeners left to remove.
            tracing::debug!(subscription = %id, error = %e, "Unsubscribe after loop stopped");
        }
    }

    /// Number of users with a running dispatch loop.
    pub async fn active_collections(&self) -> usize {
        let (active, retired) = {
            let mut partitions = self.inner.partitions.lock().await;
            let retired = self.reap_idle(&mut partitions);
            (partitions.len(), retired)
        };
        join_retired(retired).await;
        active
    }

    /// Stop every dispatch loop and wait for them to drain.
    ///
    /// Commands already queued are still processed. Afterwards every
    /// operation fails with `BackendUnavailable` and subscriptions end.
    pub async fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let partitions: Vec<Partition> = {
            let mut partitions = self.inner.partitions.lock().await;
            partitions.drain().map(|(_, partition)| partition).collect()
        };
        tracing::info!(loops = partitions.len(), "Shutting down ticket engine");

        for Partition { handle, task, .. } in partitions {
            drop(handle);
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Dispatch loop ended abnormally");
            }
        }
    }

    /// The user's dispatch loop, started if this is the first request.
    async fn dispatcher(&self, user_id: &UserId) -> Result<DispatchHandle, EngineError> {
        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(EngineError::BackendUnavailable(
                "ticket engine is shut down".to_string(),
            ));
        }

        let (handle, retired) = {
            let mut partitions = self.inner.partitions.lock().await;
            let handle = self.acquire(&mut partitions, user_id).await;
            // The caller's clone keeps its own loop out of the sweep.
            let retired = self.reap_idle(&mut partitions);
            (handle, retired)
        };
        join_retired(retired).await;
        Ok(handle)
    }

    async fn acquire(
        &self,
        partitions: &mut HashMap<UserId, Partition>,
        user_id: &UserId,
    ) -> DispatchHandle {
        if let Some(partition) = partitions.get_mut(user_id) {
            if !partition.handle.is_closed() {
                partition.last_used = Instant::now();
                return partition.handle.clone();
            }
        }

        if let Some(dead) = partitions.remove(user_id) {
            drop(dead.handle);
            if let Err(e) = dead.task.await {
                tracing::warn!(user_id = %user_id, error = %e, "Dispatch loop died, restarting");
            }
        }

        let path = CollectionPath::new(self.inner.config.application_id.clone(), user_id.clone());
        let (handle, task) = spawn_dispatch_loop(
            path,
            Arc::clone(&self.inner.store),
            &self.inner.config,
            Arc::clone(&self.inner.subscription_ids),
        );
        partitions.insert(
            user_id.clone(),
            Partition {
                handle: handle.clone(),
                task,
                last_used: Instant::now(),
            },
        );
        handle
    }

    /// Remove loops that have stopped or sat idle past the timeout.
    ///
    /// Only partitions nobody holds a handle to are touched, so dropping the
    /// map's handle closes the loop's queue.
    fn reap_idle(&self, partitions: &mut HashMap<UserId, Partition>) -> Vec<JoinHandle<()>> {
        let idle = self.inner.config.idle_timeout();
        let expired: Vec<UserId> = partitions
            .iter()
            .filter(|(_, partition)| !partition.handle.in_use())
            .filter(|(_, partition)| {
                partition.handle.is_closed() || idle.is_some_and(|idle| partition.is_idle(idle))
            })
            .map(|(user_id, _)| user_id.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|user_id| {
                let partition = partitions.remove(&user_id)?;
                if partition.handle.is_closed() {
                    tracing::warn!(user_id = %user_id, "Removed stopped dispatch loop");
                } else {
                    tracing::info!(user_id = %user_id, "Retired idle dispatch loop");
                }
                Some(partition.task)
            })
            .collect()
    }
}

/// Wait for retired loops to drain their queues and exit.
async fn join_retired(tasks: Vec<JoinHandle<()>>) {
    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Dispatch loop ended abnormally");
        }
    }
}

impl std::fmt::Debug for TicketEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketEngine")
            .field("backend", &self.inner.store.backend_name())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
