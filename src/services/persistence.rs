//! Write-behind persistence: in-memory state is updated first, durable writes
//! are queued here and executed by a small worker pool.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use tokio::{
    runtime::Handle,
    sync::{Mutex, Notify, mpsc, watch},
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dao::{
    claim_store::ClaimStore,
    models::{ChunkKey, ClaimedChunkEntity, NameCacheEntity, PartyEntity, ReservedChunkEntity},
    storage::StorageResult,
};

/// Number of workers draining the queue.
pub const WORKER_COUNT: usize = 4;
const QUEUE_CAPACITY: usize = 1024;

/// A single durable write.
#[derive(Debug, Clone)]
pub enum PersistTask {
    SaveParty(PartyEntity),
    DeleteParty(Uuid),
    SaveClaim(ClaimedChunkEntity),
    DeleteClaim(ChunkKey),
    SaveReserved(ReservedChunkEntity),
    DeleteReserved(ChunkKey),
    DeleteReservedByParty(Uuid),
    SaveName(NameCacheEntity),
    SaveAdminOverride(Uuid),
    DeleteAdminOverride(Uuid),
}

impl PersistTask {
    fn kind(&self) -> &'static str {
        match self {
            PersistTask::SaveParty(_) => "save_party",
            PersistTask::DeleteParty(_) => "delete_party",
            PersistTask::SaveClaim(_) => "save_claim",
            PersistTask::DeleteClaim(_) => "delete_claim",
            PersistTask::SaveReserved(_) => "save_reserved",
            PersistTask::DeleteReserved(_) => "delete_reserved",
            PersistTask::DeleteReservedByParty(_) => "delete_reserved_by_party",
            PersistTask::SaveName(_) => "save_name",
            PersistTask::SaveAdminOverride(_) => "save_admin_override",
            PersistTask::DeleteAdminOverride(_) => "delete_admin_override",
        }
    }

    async fn run(self, store: &dyn ClaimStore) -> StorageResult<()> {
        match self {
            PersistTask::SaveParty(party) => store.save_party(party).await,
            PersistTask::DeleteParty(id) => store.delete_party(id).await,
            PersistTask::SaveClaim(claim) => store.save_claim(claim).await,
            PersistTask::DeleteClaim(key) => store.delete_claim(key).await,
            PersistTask::SaveReserved(reserved) => store.save_reserved(reserved).await,
            PersistTask::DeleteReserved(key) => store.delete_reserved(key).await,
            PersistTask::DeleteReservedByParty(id) => store.delete_reserved_by_party(id).await,
            PersistTask::SaveName(name) => store.save_name(name).await,
            PersistTask::SaveAdminOverride(player) => store.save_admin_override(player).await,
            PersistTask::DeleteAdminOverride(player) => store.delete_admin_override(player).await,
        }
    }
}

#[derive(Default)]
struct Pending {
    count: AtomicUsize,
    idle: Notify,
}

impl Pending {
    fn start(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Non-blocking front of the durable store.
///
/// Tasks carry no ordering guarantee relative to each other and failures are
/// only logged: the in-memory registry stays the source of truth.
pub struct PersistenceGateway {
    tx: mpsc::Sender<PersistTask>,
    store: Arc<dyn ClaimStore>,
    pending: Arc<Pending>,
    degraded: watch::Sender<bool>,
    runtime: Handle,
}

impl PersistenceGateway {
    /// Start the worker pool on the current runtime.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<dyn ClaimStore>) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));
        let pending = Arc::new(Pending::default());
        let runtime = Handle::current();

        for worker in 0..WORKER_COUNT {
            runtime.spawn(run_worker(
                worker,
                store.clone(),
                rx.clone(),
                pending.clone(),
            ));
        }

        let (degraded, _rx) = watch::channel(false);
        Self {
            tx,
            store,
            pending,
            degraded,
            runtime,
        }
    }

    /// Queue a write without waiting for it.
    pub fn enqueue(&self, task: PersistTask) {
        self.pending.start();
        match self.tx.try_send(task) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(task)) => {
                debug!(task = task.kind(), "persistence queue full; deferring send");
                let tx = self.tx.clone();
                let pending = self.pending.clone();
                self.runtime.spawn(async move {
                    if let Err(err) = tx.send(task).await {
                        warn!(task = err.0.kind(), "persistence queue closed; write dropped");
                        pending.finish();
                    }
                });
            }
            Err(mpsc::error::TrySendError::Closed(task)) => {
                warn!(task = task.kind(), "persistence queue closed; write dropped");
                self.pending.finish();
            }
        }
    }

    /// Queue every task of an operation's outbox.
    pub fn enqueue_all(&self, tasks: impl IntoIterator<Item = PersistTask>) {
        for task in tasks {
            self.enqueue(task);
        }
    }

    /// Writes queued or in flight.
    pub fn pending(&self) -> usize {
        self.pending.count.load(Ordering::SeqCst)
    }

    /// Resolve once every queued write has been attempted.
    pub async fn drained(&self) {
        loop {
            let idle = self.pending.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Durable store the workers write to.
    pub fn store(&self) -> Arc<dyn ClaimStore> {
        self.store.clone()
    }

    /// Whether the durable store is currently reported unhealthy.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded flag updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, notifying watchers only on change.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}

async fn run_worker(
    worker: usize,
    store: Arc<dyn ClaimStore>,
    rx: Arc<Mutex<mpsc::Receiver<PersistTask>>>,
    pending: Arc<Pending>,
) {
    loop {
        let task = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(task) = task else {
            debug!(worker, "persistence queue closed; worker exiting");
            break;
        };

        let kind = task.kind();
        if let Err(err) = task.run(store.as_ref()).await {
            warn!(worker, task = kind, error = %err, "persistence task failed");
        }
        pending.finish();
    }
}
